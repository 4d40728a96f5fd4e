// main.rs      gifcast command
//
// Copyright (c) 2019-2023  Douglas Lau
//
#![forbid(unsafe_code)]

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use gifcast::block::{Block, DisposalMethod, GifDocument, GraphicControl, ImageFrame};
use gifcast::{Decoder, MismatchPolicy, Step};
use std::error::Error;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Main entry point
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Auto);
    match create_app().get_matches().subcommand() {
        ("show", Some(matches)) => show(&mut out, matches)?,
        ("unwrap", Some(matches)) => unwrap(&mut out, matches)?,
        _ => unreachable!(),
    }
    out.reset()?;
    Ok(())
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("gifcast")
        .version(VERSION)
        .setting(AppSettings::GlobalVersion)
        .about("GIF decoding utility")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("show")
                .about("Show GIF block table")
                .arg(
                    Arg::with_name("files")
                        .required(true)
                        .min_values(1)
                        .help("input file(s)"),
                ),
        )
        .subcommand(
            SubCommand::with_name("unwrap")
                .about("Unwrap composited frames from a GIF into PAM files")
                .arg(Arg::with_name("file").required(true).help("input file"))
                .arg(
                    Arg::with_name("discard")
                        .long("discard")
                        .help("drop frames with a size mismatch"),
                ),
        )
}

/// Color specs for output
struct Colors {
    dflt: ColorSpec,
    bold: ColorSpec,
    red: ColorSpec,
    yellow: ColorSpec,
    cyan: ColorSpec,
    magenta: ColorSpec,
}

impl Colors {
    fn new() -> Self {
        let mut dflt = ColorSpec::new();
        dflt.set_fg(Some(Color::White));
        let mut bold = ColorSpec::new();
        bold.set_fg(Some(Color::White))
            .set_intense(true)
            .set_bold(true);
        let mut red = ColorSpec::new();
        red.set_fg(Some(Color::Red)).set_intense(true);
        let mut yellow = ColorSpec::new();
        yellow.set_fg(Some(Color::Yellow)).set_intense(true);
        let mut cyan = ColorSpec::new();
        cyan.set_fg(Some(Color::Cyan)).set_intense(true);
        let mut magenta = ColorSpec::new();
        magenta.set_fg(Some(Color::Magenta));
        Colors {
            dflt,
            bold,
            red,
            yellow,
            cyan,
            magenta,
        }
    }
}

/// Column widths of a frame table
struct Columns {
    frame_digits: usize,
    size_digits: usize,
}

/// Handle show subcommand
fn show(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    if let Some(values) = matches.values_of_os("files") {
        for path in values {
            show_file(out, path)?;
        }
    }
    Ok(())
}

/// Show one GIF file
fn show_file(
    out: &mut StandardStream,
    path: &OsStr,
) -> Result<(), Box<dyn Error>> {
    let clr = Colors::new();
    let f = BufReader::new(File::open(path)?);
    let decoded = Decoder::new(f).decode()?;
    let doc = &decoded.document;
    let frames = frame_controls(doc);
    let cols = Columns {
        frame_digits: digits(frames.len()).max(3),
        size_digits: 4.max(1 + digits(doc.width()) + digits(doc.height())),
    };
    let version = String::from_utf8_lossy(&doc.version()).to_string();
    let mut comments = vec![];
    for block in doc.blocks() {
        if let Block::Comment(cmt) = block {
            for c in cmt.comments() {
                for l in c.split('\n') {
                    let l = l.trim();
                    if !l.is_empty() {
                        comments.push(l.to_string());
                    }
                }
            }
        }
    }
    out.set_color(&clr.magenta)?;
    writeln!(out, "{path:?}")?;
    out.set_color(&clr.bold)?;
    write!(
        out,
        "GIF{version} {}x{}, frames: {}",
        doc.width(),
        doc.height(),
        frames.len()
    )?;
    if let Some(c) = doc.loop_count() {
        write!(out, ", repeat: ")?;
        if c == 0 {
            write!(out, "∞")?;
        } else {
            write!(out, "{c}")?;
        }
    }
    writeln!(out)?;
    out.set_color(&clr.cyan)?;
    for c in comments {
        writeln!(out, "  # {c}")?;
    }
    out.set_color(&clr.yellow)?;
    write!(out, " {:>w$}", "Fr#", w = cols.frame_digits)?;
    write!(out, "  Delay Disp")?;
    write!(out, " {:>w$}", "Size", w = cols.size_digits)?;
    write!(out, " {:>w$}", "X,Y", w = cols.size_digits)?;
    writeln!(out, " Clrs Trn")?;
    let global_clr = doc.global_color_table().map_or(0, |t| t.len());
    for (n, (frame, control)) in frames.into_iter().enumerate() {
        show_frame(out, &clr, &cols, doc, frame, control, global_clr, n)?;
    }
    for e in &decoded.discarded {
        out.set_color(&clr.red)?;
        writeln!(out, "discarded: {e}")?;
    }
    if let Some(e) = &decoded.error {
        out.set_color(&clr.red)?;
        writeln!(out, "error: {e}")?;
    }
    Ok(())
}

/// Pair each frame with its graphic control
fn frame_controls(
    doc: &GifDocument,
) -> Vec<(&ImageFrame, Option<GraphicControl>)> {
    let mut control = None;
    let mut frames = vec![];
    for block in doc.blocks() {
        match block {
            Block::GraphicControl(gc) => control = Some(*gc),
            Block::ImageFrame(frame) => frames.push((frame, control.take())),
            _ => (),
        }
    }
    frames
}

/// Show one frame of a GIF file
#[allow(clippy::too_many_arguments)]
fn show_frame(
    out: &mut StandardStream,
    clr: &Colors,
    cols: &Columns,
    doc: &GifDocument,
    frame: &ImageFrame,
    control: Option<GraphicControl>,
    global_clr: usize,
    number: usize,
) -> Result<(), Box<dyn Error>> {
    out.set_color(&clr.dflt)?;
    let interlaced = if frame.interlaced() { 'i' } else { ' ' };
    write!(out, "{interlaced}")?;
    out.set_color(&clr.bold)?;
    write!(out, "{:>w$}", number, w = cols.frame_digits)?;
    let d = control.map_or(0, |gc| gc.delay_time_cs());
    if d == 0 {
        out.set_color(&clr.dflt)?;
    }
    write!(out, " {:6.2}", f32::from(d) / 100.0)?;
    let d = match control.map(|gc| gc.disposal_method()) {
        Some(DisposalMethod::NoAction) => "none",
        Some(DisposalMethod::Keep) => "keep",
        Some(DisposalMethod::Background) => "bg",
        Some(DisposalMethod::Previous) => "prev",
        Some(DisposalMethod::Reserved(_)) => "res",
        None => "-",
    };
    out.set_color(match d {
        "none" | "-" => &clr.dflt,
        "res" => &clr.red,
        _ => &clr.bold,
    })?;
    write!(out, " {d:>4}")?;
    if doc.width() == frame.width() && doc.height() == frame.height() {
        out.set_color(&clr.dflt)?;
    } else {
        out.set_color(&clr.bold)?;
    }
    write!(
        out,
        " {:>w$}",
        &format!("{}x{}", frame.width(), frame.height()),
        w = cols.size_digits
    )?;
    if frame.left() == 0 && frame.top() == 0 {
        out.set_color(&clr.dflt)?;
    } else {
        out.set_color(&clr.bold)?;
    }
    write!(
        out,
        " {:>w$}",
        &format!("{},{}", frame.left(), frame.top()),
        w = cols.size_digits
    )?;
    match frame.local_color_table() {
        Some(tbl) => {
            out.set_color(&clr.bold)?;
            write!(out, "  {:3}", tbl.len())?;
        }
        None => {
            out.set_color(&clr.dflt)?;
            write!(out, " {global_clr:3}g")?;
        }
    }
    match control.and_then(|gc| gc.transparent_color()) {
        Some(tc) => {
            out.set_color(&clr.bold)?;
            writeln!(out, " {tc:>3}")?;
        }
        None => {
            out.set_color(&clr.dflt)?;
            writeln!(out, " {:>3}", "-")?;
        }
    }
    Ok(())
}

/// Handle unwrap subcommand
fn unwrap(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let clr = Colors::new();
    let path = Path::new(matches.value_of_os("file").ok_or("no file")?);
    let policy = if matches.is_present("discard") {
        MismatchPolicy::Discard
    } else {
        MismatchPolicy::Abort
    };
    let f = BufReader::new(File::open(path)?);
    let decoded = Decoder::new(f).mismatch_policy(policy).decode()?;
    if let Some(e) = &decoded.error {
        out.set_color(&clr.red)?;
        writeln!(out, "{path:?}: {e}")?;
    }
    let doc = decoded.document;
    let stem = path.file_stem().ok_or("invalid file name")?;
    for (n, step) in doc.steps().enumerate() {
        let name = format!("{}_{:03}.pam", stem.to_string_lossy(), n);
        let out_path = path.with_file_name(name);
        write_pam(&out_path, &step?)?;
        out.set_color(&clr.dflt)?;
        writeln!(out, "{}", out_path.display())?;
    }
    Ok(())
}

/// Write a step as a PAM (RGB_ALPHA) file
fn write_pam(path: &Path, step: &Step) -> Result<(), Box<dyn Error>> {
    let mut w = BufWriter::new(File::create(path)?);
    let raster = step.raster();
    writeln!(w, "P7")?;
    writeln!(w, "WIDTH {}", raster.width())?;
    writeln!(w, "HEIGHT {}", raster.height())?;
    writeln!(w, "DEPTH 4")?;
    writeln!(w, "MAXVAL 255")?;
    writeln!(w, "TUPLTYPE RGB_ALPHA")?;
    writeln!(w, "ENDHDR")?;
    w.write_all(step.as_u8_slice())?;
    w.flush()?;
    Ok(())
}

/// Count decimal digits of a value
fn digits<T: Into<usize>>(v: T) -> usize {
    match v.into() {
        0..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        1000..=9999 => 4,
        _ => 5,
    }
}
