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

//! The runtime library, embedded at build time.
//!
//! CPU libraries hold arithmetic, printing, strings, DATA and the
//! protothread scheduler; machine libraries hold text, video, sound,
//! keyboard and timer access. A module is found by name in the machine
//! library first, so a machine can stand in for a processor routine.

use super::RuntimeModule;

macro_rules! module {
    ($name:literal, $path:literal, requires: [$($req:literal),*], variables: [$(($var:literal, $size:literal)),*], init: $init:expr) => {
        RuntimeModule {
            name: $name,
            source: include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/runtime/", $path)),
            requires: &[$($req),*],
            variables: &[$(($var, $size)),*],
            init: $init,
        }
    };
}

pub static MOS6502_LIBRARY: &[RuntimeModule] = &[
    module!("vars", "6502/vars.s", requires: [],
        variables: [("MATHA", "4"), ("MATHB", "4"), ("MATHR", "4"), ("MATHM", "4"), ("DSPTR", "2")],
        init: None),
    module!("mul", "6502/mul.s", requires: ["vars"], variables: [], init: None),
    module!("div", "6502/div.s", requires: ["vars"],
        variables: [("DIVSIGN", "1"), ("DIVQSIGN", "1")],
        init: None),
    module!("print", "6502/print.s", requires: ["vars", "div", "text"],
        variables: [("PRINTCOUNT", "1"), ("PRINTINDEX", "1")],
        init: None),
    module!("random", "6502/random.s", requires: ["vars"], variables: [("RANDSEED", "2")], init: None),
    module!("memmove", "6502/memmove.s", requires: ["vars"],
        variables: [("MEMLEN", "2"), ("MEMVAL", "1")],
        init: None),
    module!("dstring", "6502/dstring.s", requires: ["vars", "div", "text"],
        variables: [
            ("DSFLAGS", "DSCOUNT"), ("DSLENS", "DSCOUNT"), ("DSADDRL", "DSCOUNT"), ("DSADDRH", "DSCOUNT"),
            ("DSHEAP", "DSSPACE"), ("DSFREEPTR", "2"), ("DSA", "1"), ("DSB", "1"), ("DSLEN", "1"),
            ("DSPOS", "1"), ("DSOFF", "1"), ("DSCOPYLEN", "1"), ("DSSRCX", "1"), ("DSSRCY", "1"),
            ("DSBEST", "1"), ("DSTMP", "2"), ("DSNUMBUF", "6"), ("DSNUMLEN", "1"), ("DSNEG", "1")
        ],
        init: Some("DSINIT")),
    module!("data", "6502/data.s", requires: ["vars"],
        variables: [("DATAPTR", "2"), ("DATATAG", "1"), ("DATALEN", "1")],
        init: Some("DATARESTORE")),
    module!("datastr", "6502/datastr.s", requires: ["data", "dstring"], variables: [], init: None),
    module!("datarestore", "6502/datarestore.s", requires: ["data"],
        variables: [("DATALINE", "2")],
        init: None),
    module!("thread", "6502/thread.s", requires: ["vars"],
        variables: [
            ("PTSTATE", "THREADS"), ("PTSTEP", "THREADS"), ("PTADDRL", "THREADS"), ("PTADDRH", "THREADS"),
            ("PTCURRENT", "1"), ("PTADDR", "2"), ("PTJUMP", "2"), ("PTOFFSET", "2")
        ],
        init: Some("PTINIT")),
    module!("float", "6502/float.s", requires: ["vars", "div", "print", "text"],
        variables: [
            ("FPA", "4"), ("FPB", "4"), ("FPR", "4"), ("FPAU", "5"), ("FPBU", "5"), ("FPPROD", "6"),
            ("FPEXP", "2"), ("FPREM", "4"), ("FPTRIAL", "3"), ("FPPRINTV", "4"), ("FPPRINTI", "4"),
            ("FPPRINTX", "1")
        ],
        init: None),
    module!("timertick", "6502/timertick.s", requires: ["vars"],
        variables: [
            ("TIMERPERIOD", "2"), ("TIMERHANDLER", "2"), ("TIMERCOUNT", "2"), ("TIMERBUSY", "1"),
            ("TIMERENABLED", "1"), ("TIMERINSTALLED", "1"), ("TIMERCHAIN", "2")
        ],
        init: None),
];

pub static MC6809_LIBRARY: &[RuntimeModule] = &[
    module!("vars", "6809/vars.s", requires: [],
        variables: [
            ("MATHA", "4"), ("MATHB", "4"), ("MATHR", "4"), ("MATHM", "4"), ("DSPTR", "2"),
            ("PTR0", "2"), ("PTR1", "2")
        ],
        init: None),
    module!("mul", "6809/mul.s", requires: ["vars"], variables: [], init: None),
    module!("div", "6809/div.s", requires: ["vars"],
        variables: [("DIVSIGN", "1"), ("DIVQSIGN", "1")],
        init: None),
    module!("print", "6809/print.s", requires: ["vars", "div", "text"],
        variables: [("PRINTCOUNT", "1")],
        init: None),
    module!("random", "6809/random.s", requires: ["vars"], variables: [("RANDSEED", "2")], init: None),
    module!("memmove", "6809/memmove.s", requires: ["vars"],
        variables: [("MEMLEN", "2"), ("MEMVAL", "1")],
        init: None),
    module!("dstring", "6809/dstring.s", requires: ["vars", "div", "text"],
        variables: [
            ("DSTABLE", "DSTABLESIZE"), ("DSHEAP", "DSSPACE"), ("DSFREEPTR", "2"), ("DSA", "1"),
            ("DSB", "1"), ("DSLEN", "1"), ("DSPOS", "1"), ("DSOFF", "1"), ("DSCOPYLEN", "1"),
            ("DSSRCX", "1"), ("DSSRCY", "1"), ("DSBEST", "2"), ("DSTMP", "2"), ("DSNUMBUF", "6"),
            ("DSNUMLEN", "1"), ("DSNEG", "1")
        ],
        init: Some("DSINIT")),
    module!("data", "6809/data.s", requires: ["vars"],
        variables: [("DATAPTR", "2"), ("DATATAG", "1")],
        init: Some("DATARESTORE")),
    module!("datastr", "6809/datastr.s", requires: ["data", "dstring"], variables: [], init: None),
    module!("datarestore", "6809/datarestore.s", requires: ["data"],
        variables: [("DATALINE", "2")],
        init: None),
    module!("thread", "6809/thread.s", requires: ["vars"],
        variables: [
            ("PTSTATE", "THREADS"), ("PTSTEP", "THREADS"), ("PTADDRS", "THREADWORDS"),
            ("PTCURRENT", "1"), ("PTADDR", "2"), ("PTOFFSET", "2")
        ],
        init: Some("PTINIT")),
    module!("float", "6809/float.s", requires: ["vars", "div", "print", "text"],
        variables: [
            ("FPA", "4"), ("FPB", "4"), ("FPR", "4"), ("FPAU", "5"), ("FPBU", "5"), ("FPPROD", "6"),
            ("FPEXP", "2"), ("FPREM", "4"), ("FPTRIAL", "3"), ("FPPRINTV", "4"), ("FPPRINTI", "4")
        ],
        init: None),
    module!("timertick", "6809/timertick.s", requires: ["vars"],
        variables: [
            ("TIMERPERIOD", "2"), ("TIMERHANDLER", "2"), ("TIMERCOUNT", "2"), ("TIMERBUSY", "1"),
            ("TIMERENABLED", "1"), ("TIMERINSTALLED", "1"), ("TIMERCHAIN", "2")
        ],
        init: None),
];

pub static C64_LIBRARY: &[RuntimeModule] = &[
    module!("text", "c64/text.s", requires: [],
        variables: [("TEXTC", "1"), ("TEXTX", "1"), ("TEXTY", "1")],
        init: None),
    module!("input", "c64/input.s", requires: ["vars"], variables: [], init: None),
    module!("bitmap", "c64/bitmap.s", requires: ["vars", "memmove"],
        variables: [
            ("BITMAPMODE", "1"), ("BITMAPCURRENT", "1"), ("BITMAPTMP", "1"), ("PLOTX", "2"),
            ("PLOTY", "1"), ("PLOTC", "1"), ("PLOTXL", "1"), ("PLOTXH", "1")
        ],
        init: None),
    module!("video", "c64/video.s", requires: [], variables: [("VIDEOC", "1")], init: None),
    module!("image", "c64/image.s", requires: ["bitmap", "memmove"],
        variables: [
            ("IMAGEPTR", "2"), ("IMAGEX", "2"), ("IMAGEY", "1"), ("IMAGEW", "1"), ("IMAGEH", "1"),
            ("IMAGEMODE", "1"), ("IMAGECX", "1"), ("IMAGECY", "1"), ("IMAGEROW", "1"),
            ("IMAGEBASE", "1"), ("IMAGETMP", "2")
        ],
        init: None),
    module!("sprite", "c64/sprite.s", requires: ["vars"],
        variables: [
            ("SPRITEN", "1"), ("SPRITEX", "2"), ("SPRITEY", "1"), ("SPRITEC", "1"), ("SPRITEPTR", "2")
        ],
        init: None),
    module!("tiles", "c64/tiles.s", requires: ["vars"],
        variables: [
            ("TILEMAPPTR", "2"), ("TILEX", "1"), ("TILEY", "1"), ("TILEW", "1"), ("TILEH", "1"),
            ("TILETMP", "2")
        ],
        init: None),
    module!("audio", "c64/audio.s", requires: ["video"],
        variables: [
            ("AUDIOV", "1"), ("AUDIOVOICES", "1"), ("AUDIONOTE", "1"), ("AUDIODURATION", "2"),
            ("AUDIOLEVEL", "1"), ("AUDIOMASK", "1")
        ],
        init: Some("AUDIOINIT")),
    module!("dload", "c64/dload.s", requires: ["vars"],
        variables: [("DLOADNAME", "2"), ("DLOADADDR", "2")],
        init: None),
    module!("timer", "c64/timer.s", requires: ["timertick"], variables: [], init: None),
    module!("startup", "c64/startup.s", requires: [], variables: [], init: None),
];

pub static ATARI_LIBRARY: &[RuntimeModule] = &[
    module!("text", "atari/text.s", requires: [],
        variables: [("TEXTC", "1"), ("TEXTX", "1"), ("TEXTY", "1")],
        init: None),
    module!("input", "atari/input.s", requires: ["vars"], variables: [], init: None),
    module!("bitmap", "atari/bitmap.s", requires: ["vars", "text", "memmove"],
        variables: [
            ("BITMAPMODE", "1"), ("BITMAPCURRENT", "1"), ("BITMAPTMP", "2"), ("PLOTX", "2"),
            ("PLOTY", "1"), ("PLOTC", "1")
        ],
        init: None),
    module!("video", "atari/video.s", requires: [], variables: [("VIDEOC", "1")], init: None),
    module!("image", "atari/image.s", requires: ["bitmap"],
        variables: [
            ("IMAGEPTR", "2"), ("IMAGEX", "2"), ("IMAGEY", "1"), ("IMAGEW", "1"), ("IMAGEH", "1"),
            ("IMAGEMODE", "1"), ("IMAGETMP", "1")
        ],
        init: None),
    module!("sprite", "atari/sprite.s", requires: ["vars"],
        variables: [
            ("SPRITEN", "1"), ("SPRITEX", "2"), ("SPRITEY", "1"), ("SPRITEC", "1"), ("SPRITEPTR", "2"),
            ("SPRITEH", "1"), ("SPRITEXS", "4"), ("SPRITEYS", "4"), ("SPRITEPTRL", "4"),
            ("SPRITEPTRH", "4")
        ],
        init: None),
    module!("tiles", "atari/tiles.s", requires: ["vars"],
        variables: [
            ("TILEMAPPTR", "2"), ("TILEX", "1"), ("TILEY", "1"), ("TILEW", "1"), ("TILEH", "1"),
            ("TILETMP", "2")
        ],
        init: None),
    module!("audio", "atari/audio.s", requires: ["video"],
        variables: [
            ("AUDIOV", "1"), ("AUDIOVOICES", "1"), ("AUDIONOTE", "1"), ("AUDIODURATION", "2"),
            ("AUDIOLEVEL", "1"), ("AUDIOMASK", "1")
        ],
        init: Some("AUDIOINIT")),
    module!("dload", "atari/dload.s", requires: ["vars"],
        variables: [("DLOADNAME", "2"), ("DLOADADDR", "2"), ("DLOADLEN", "1"), ("DLOADPATH", "16")],
        init: None),
    module!("timer", "atari/timer.s", requires: ["timertick"], variables: [], init: None),
    module!("startup", "atari/startup.s", requires: ["text"], variables: [], init: None),
];

pub static COCO_LIBRARY: &[RuntimeModule] = &[
    module!("text", "coco/text.s", requires: [],
        variables: [("TEXTC", "1"), ("TEXTX", "1"), ("TEXTY", "1")],
        init: None),
    module!("input", "coco/input.s", requires: ["vars"], variables: [], init: None),
    module!("bitmap", "coco/bitmap.s", requires: ["vars", "text", "memmove"],
        variables: [
            ("BITMAPMODE", "1"), ("BITMAPCURRENT", "1"), ("BITMAPTMP", "1"), ("PLOTX", "2"),
            ("PLOTY", "1"), ("PLOTC", "1")
        ],
        init: None),
    module!("video", "coco/video.s", requires: [], variables: [("VIDEOC", "1")], init: None),
    module!("image", "coco/image.s", requires: [],
        variables: [
            ("IMAGEPTR", "2"), ("IMAGEX", "2"), ("IMAGEY", "1"), ("IMAGEW", "1"), ("IMAGEH", "1"),
            ("IMAGEMODE", "1")
        ],
        init: None),
    module!("tiles", "coco/tiles.s", requires: [],
        variables: [("TILEMAPPTR", "2"), ("TILEX", "1"), ("TILEY", "1"), ("TILEW", "1"), ("TILEH", "1")],
        init: None),
    module!("audio", "coco/audio.s", requires: [],
        variables: [
            ("AUDIOV", "1"), ("AUDIOVOICES", "1"), ("AUDIONOTE", "1"), ("AUDIODURATION", "2"),
            ("AUDIOLEVEL", "1"), ("AUDIOEND", "2")
        ],
        init: Some("AUDIOINIT")),
    module!("timer", "coco/timer.s", requires: ["timertick"], variables: [], init: None),
    module!("startup", "coco/startup.s", requires: ["text"], variables: [], init: None),
];
