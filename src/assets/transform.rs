// ugBC - A retargetable BASIC compiler creating binaries for 8-bit home computers
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Geometric transforms applied to decoded images before conversion.

use super::DecodedImage;

/// Mirror left to right.
pub fn flip_x(image: &mut DecodedImage) {
    let width = image.width;
    for row in image.pixels.chunks_mut(width) {
        row.reverse();
    }
}

/// Mirror top to bottom.
pub fn flip_y(image: &mut DecodedImage) {
    let width = image.width;
    let height = image.height;
    for y in 0..height / 2 {
        for x in 0..width {
            image.pixels.swap(y * width + x, (height - 1 - y) * width + x);
        }
    }
}

/// Rotate columns left by `by` pixels; columns leaving on the left
/// come back on the right.
pub fn roll_x(image: &mut DecodedImage, by: usize) {
    let width = image.width;
    if width == 0 {
        return;
    }
    for row in image.pixels.chunks_mut(width) {
        row.rotate_left(by % width);
    }
}

/// Rotate rows up by `by` pixels.
pub fn roll_y(image: &mut DecodedImage, by: usize) {
    if image.height == 0 {
        return;
    }
    let by = (by % image.height) * image.width;
    image.pixels.rotate_left(by);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: usize, height: usize) -> DecodedImage {
        let pixels = (0..width * height).map(|i| [i as u8, 0, 0, 255]).collect();
        DecodedImage {
            width,
            height,
            pixels,
        }
    }

    fn reds(image: &DecodedImage) -> Vec<u8> {
        image.pixels.iter().map(|p| p[0]).collect()
    }

    #[test]
    fn test_flips() {
        let mut img = image(3, 2);
        flip_x(&mut img);
        assert_eq!(reds(&img), vec![2, 1, 0, 5, 4, 3]);
        let mut img = image(3, 2);
        flip_y(&mut img);
        assert_eq!(reds(&img), vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_rolls() {
        let mut img = image(4, 2);
        roll_x(&mut img, 1);
        assert_eq!(reds(&img), vec![1, 2, 3, 0, 5, 6, 7, 4]);
        let mut img = image(2, 3);
        roll_y(&mut img, 1);
        assert_eq!(reds(&img), vec![2, 3, 4, 5, 0, 1]);
    }

    #[test]
    fn test_flip_twice_is_identity() {
        let mut img = image(5, 3);
        flip_x(&mut img);
        flip_x(&mut img);
        flip_y(&mut img);
        flip_y(&mut img);
        assert_eq!(img, image(5, 3));
    }
}
