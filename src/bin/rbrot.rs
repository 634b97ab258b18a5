extern crate clap;
extern crate env_logger;
extern crate image;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;
extern crate resumebrot;

use clap::{App, Arg, ArgMatches};
use image::pnm::PNMEncoder;
use image::pnm::{PNMSubtype, SampleEncoding};
use image::ColorType;
use num::Complex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use resumebrot::{
    Canvas, Color, Config, Engine, EngineError, EscapeTime, Inside, InterruptPoll, Julia,
    Mandelbrot, Never, OrbitMath, Outcome, Outside, PlaneMapper, Raster, StopAfter, Strategy,
    Symmetry, Threaded,
};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_parse<T: FromStr<Err = String>>(s: &str) -> Result<(), String> {
    T::from_str(s).map(|_| ())
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const LEFTLOWER: &str = "leftlower";
const RIGHTUPPER: &str = "rightupper";
const THREADS: &str = "threads";
const ITERATIONS: &str = "iterations";
const METHOD: &str = "method";
const SYMMETRY: &str = "symmetry";
const MAXBLOCK: &str = "maxblock";
const COLORS: &str = "colors";
const INSIDE: &str = "inside";
const OUTSIDE: &str = "outside";
const JULIA: &str = "julia";
const NOPERIODICITY: &str = "no-periodicity";
const FILL: &str = "fill";
const STATE: &str = "state";
const RESUME: &str = "resume";
const STOPAFTER: &str = "stop-after";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("rbrot")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Interruptible escape-time fractal renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file (PPM)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(LEFTLOWER)
                .required(false)
                .allow_hyphen_values(true)
                .long(LEFTLOWER)
                .short("l")
                .takes_value(true)
                .default_value("-2.5,-1.25")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse left lower corner"))
                .help("Left lower corner of the complex plane"),
        )
        .arg(
            Arg::with_name(RIGHTUPPER)
                .required(false)
                .allow_hyphen_values(true)
                .long(RIGHTUPPER)
                .short("r")
                .takes_value(true)
                .default_value("1.0,1.25")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse right upper corner"))
                .help("Right upper corner of the complex plane"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .default_value("1")
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of threads to render with"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("150")
                .validator(move |s| {
                    validate_range(
                        &s,
                        2,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 2 and 1000000",
                    )
                })
                .help("Iterations before a point counts as inside"),
        )
        .arg(
            Arg::with_name(METHOD)
                .required(false)
                .long(METHOD)
                .short("m")
                .takes_value(true)
                .default_value("g")
                .validator(|s| validate_parse::<Strategy>(&s))
                .help("Drawing method: 1, 2, g(uess), b(oundary), t(esseral) or d(iffusion)"),
        )
        .arg(
            Arg::with_name(SYMMETRY)
                .required(false)
                .long(SYMMETRY)
                .takes_value(true)
                .default_value("none")
                .validator(|s| validate_parse::<Symmetry>(&s))
                .help("Symmetry to exploit: none, x, y, xy, origin or pi"),
        )
        .arg(
            Arg::with_name(MAXBLOCK)
                .required(false)
                .long(MAXBLOCK)
                .takes_value(true)
                .default_value("16")
                .validator(|s| {
                    validate_range(
                        &s,
                        2,
                        256,
                        "Could not parse block size",
                        "Block size must be between 2 and 256",
                    )
                })
                .help("Largest block solid guessing starts from"),
        )
        .arg(
            Arg::with_name(COLORS)
                .required(false)
                .long(COLORS)
                .takes_value(true)
                .default_value("256")
                .validator(|s| {
                    validate_range(
                        &s,
                        2,
                        65_536,
                        "Could not parse palette size",
                        "Palette size must be between 2 and 65536",
                    )
                })
                .help("Palette size"),
        )
        .arg(
            Arg::with_name(INSIDE)
                .required(false)
                .long(INSIDE)
                .takes_value(true)
                .default_value("1")
                .validator(|s| validate_parse::<Inside>(&s))
                .help("Inside color: a palette index or 'period'"),
        )
        .arg(
            Arg::with_name(OUTSIDE)
                .required(false)
                .long(OUTSIDE)
                .takes_value(true)
                .default_value("iter")
                .validator(|s| validate_parse::<Outside>(&s))
                .help("Outside color: 'iter', 'potential' or a palette index"),
        )
        .arg(
            Arg::with_name(JULIA)
                .required(false)
                .allow_hyphen_values(true)
                .long(JULIA)
                .short("j")
                .takes_value(true)
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse Julia constant"))
                .help("Render the Julia set for this constant instead"),
        )
        .arg(
            Arg::with_name(NOPERIODICITY)
                .long(NOPERIODICITY)
                .help("Do not cut cycling orbits short"),
        )
        .arg(
            Arg::with_name(FILL)
                .long(FILL)
                .help("Diffusion paints a block around each point"),
        )
        .arg(
            Arg::with_name(STATE)
                .required(false)
                .long(STATE)
                .takes_value(true)
                .help("Where to save the remaining work when interrupted"),
        )
        .arg(
            Arg::with_name(RESUME)
                .required(false)
                .long(RESUME)
                .takes_value(true)
                .help("Pick up the work saved in this file"),
        )
        .arg(
            Arg::with_name(STOPAFTER)
                .required(false)
                .long(STOPAFTER)
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        0u64,
                        u64::max_value(),
                        "Could not parse poll count",
                        "Poll count out of range",
                    )
                })
                .help("Interrupt after this many polls (single thread only)"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, EngineError> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| EngineError::Configuration(format!("Could not parse --{}", name)))
}

fn config(matches: &ArgMatches) -> Result<Config, EngineError> {
    Ok(Config {
        strategy: value(matches, METHOD)?,
        symmetry: value(matches, SYMMETRY)?,
        max_iterations: value(matches, ITERATIONS)?,
        max_block: value(matches, MAXBLOCK)?,
        colors: value(matches, COLORS)?,
        inside: value(matches, INSIDE)?,
        outside: value(matches, OUTSIDE)?,
        periodicity: !matches.is_present(NOPERIODICITY),
        diffusion_fill: matches.is_present(FILL),
        ..Config::default()
    })
}

/// The raster dump that travels next to a resume blob.
fn pixels_path(state: &Path) -> PathBuf {
    let mut name = state.as_os_str().to_owned();
    name.push(".pixels");
    PathBuf::from(name)
}

fn save_state(state: &Path, blob: &[u8], canvas: &Canvas) -> Result<(), EngineError> {
    fs::write(state, blob)?;
    let dump: Vec<u8> = canvas
        .pixels()
        .iter()
        .flat_map(|c| c.to_le_bytes().to_vec())
        .collect();
    fs::write(pixels_path(state), dump)?;
    Ok(())
}

fn load_canvas(state: &Path, width: i32, height: i32) -> Result<Canvas, EngineError> {
    let dump = fs::read(pixels_path(state))?;
    let pixels: Vec<Color> = dump
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| Color::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Canvas::from_pixels(width, height, pixels).ok_or_else(|| {
        EngineError::BadResume(format!(
            "saved pixels do not make a {}x{} image",
            width, height
        ))
    })
}

/// Spreads palette indices over a red-gold-blue ramp.  The background
/// stays black.
fn shade(color: Color, colors: u32) -> [u8; 3] {
    if color == 0 {
        return [0, 0, 0];
    }
    let t = f64::from(color) / f64::from(colors.max(2) - 1);
    let wave = |phase: f64| ((t * 6.0 + phase).sin() * 127.5 + 127.5) as u8;
    [wave(0.0), wave(2.1), wave(4.2)]
}

fn write_image(outfile: &str, canvas: &Canvas, colors: u32) -> Result<(), EngineError> {
    let rgb: Vec<u8> = canvas
        .pixels()
        .iter()
        .flat_map(|&c| shade(c, colors).to_vec())
        .collect();
    let output = File::create(Path::new(outfile))?;
    let mut encoder =
        PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
    encoder.encode(&rgb[..], canvas.width() as u32, canvas.height() as u32, ColorType::RGB(8))?;
    Ok(())
}

fn render<M>(matches: &ArgMatches, math: M) -> Result<(), EngineError>
where
    M: OrbitMath + Clone + Sync,
{
    let config = config(matches)?;
    let (width, height): (u16, u16) = parse_pair(matches.value_of(SIZE).unwrap_or(""), 'x')
        .ok_or_else(|| EngineError::Configuration("Could not parse image size".to_string()))?;
    let leftlower = parse_complex(matches.value_of(LEFTLOWER).unwrap_or(""))
        .ok_or_else(|| EngineError::Configuration("Could not parse left lower corner".to_string()))?;
    let rightupper = parse_complex(matches.value_of(RIGHTUPPER).unwrap_or(""))
        .ok_or_else(|| EngineError::Configuration("Could not parse right upper corner".to_string()))?;
    let plane = PlaneMapper::new(width as usize, height as usize, leftlower, rightupper)?;
    let (width, height) = (i32::from(width), i32::from(height));
    let threads: usize = value(matches, THREADS)?;
    let stop_after: Option<u64> = match matches.value_of(STOPAFTER) {
        Some(_) => Some(value(matches, STOPAFTER)?),
        None => None,
    };
    let state = matches.value_of(STATE).map(Path::new);
    let resume = matches.value_of(RESUME).map(Path::new);

    let (canvas, outcome) = if threads > 1 && resume.is_none() {
        if stop_after.is_some() {
            return Err(EngineError::Configuration(
                "--stop-after needs a single thread".to_string(),
            ));
        }
        let stop = AtomicBool::new(false);
        Threaded::new(&config, width, height, plane.axes())
            .with_threads(threads)
            .render(|| EscapeTime::new(math.clone(), plane.clone(), &config), &stop)?
    } else {
        let (mut engine, mut canvas) = match resume {
            Some(saved) => (
                Engine::resume(&config, plane.axes(), &fs::read(saved)?)?,
                load_canvas(saved, width, height)?,
            ),
            None => (
                Engine::new(&config, width, height, plane.axes()),
                Canvas::new(width, height),
            ),
        };
        let mut pixels = EscapeTime::new(math, plane.clone(), &config);
        let mut poll: Box<dyn InterruptPoll> = match stop_after {
            Some(n) => Box::new(StopAfter(n)),
            None => Box::new(Never),
        };
        let outcome = engine.run(&mut canvas, &mut pixels, &mut *poll)?;
        info!(
            "periodicity checking cut {} orbits short",
            pixels.cycles_caught()
        );
        (canvas, outcome)
    };

    if let Outcome::Interrupted(blob) = outcome {
        match state {
            Some(state) => {
                save_state(state, &blob, &canvas)?;
                info!("interrupted; remaining work saved to {}", state.display());
            }
            None => warn!("interrupted with nowhere to save the remaining work"),
        }
    }
    write_image(matches.value_of(OUTPUT).unwrap_or("out.ppm"), &canvas, config.colors)
}

fn main() {
    env_logger::init();
    let matches = args();

    let result = match matches.value_of(JULIA).and_then(parse_complex) {
        Some(k) => render(&matches, Julia::new(k, 2.0)),
        None => render(&matches, Mandelbrot::new(2.0)),
    };

    if let Err(e) = result {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
