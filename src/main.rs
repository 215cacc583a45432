use std::fs;
use std::io;
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use line_ext_sort::buffer::DEFAULT_CHUNK_LIMIT;
use line_ext_sort::{ExternalSorter, ExternalSorterBuilder, LimitedBufferBuilder};

const EXIT_INVALID_ARGS: i32 = 1;
const EXIT_INPUT_ERROR: i32 = 2;
const EXIT_SORT_ERROR: i32 = 3;

/// Command line default of the chunk line limit, kept equal to [`DEFAULT_CHUNK_LIMIT`].
const DEFAULT_LIMIT: &str = "10000";

fn main() {
    let arg_parser = match build_arg_parser(std::env::args_os()) {
        Ok(arg_parser) => arg_parser,
        Err(err) => {
            // help and argument errors alike
            let _ = err.print();
            process::exit(EXIT_INVALID_ARGS);
        }
    };

    let log_level: LogLevel = value_or_exit(&arg_parser, "log_level");
    init_logger(log_level);

    let limit: usize = value_or_exit(&arg_parser, "limit");
    let merge_limit: Option<usize> = arg_parser
        .is_present("merge_limit")
        .then(|| value_or_exit(&arg_parser, "merge_limit"));
    let buffer_size: Option<ByteSize> = arg_parser
        .is_present("buffer_size")
        .then(|| value_or_exit(&arg_parser, "buffer_size"));
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");

    let mut sorter_builder = ExternalSorterBuilder::new().with_buffer(LimitedBufferBuilder::new(limit, false));
    if let Some(merge_limit) = merge_limit {
        sorter_builder = sorter_builder.with_merge_limit(merge_limit);
    }

    if let Some(buffer_size) = buffer_size {
        let buf_size = match rw_buf_size(buffer_size) {
            Some(buf_size) => buf_size,
            None => {
                eprintln!("error: buffer size {} exceeds the address space", buffer_size);
                process::exit(EXIT_INVALID_ARGS);
            }
        };
        sorter_builder = sorter_builder.with_rw_buf_size(buf_size);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let input: Box<dyn io::Read> = match arg_parser.value_of("input") {
        Some(input) => match fs::File::open(input) {
            Ok(file) => Box::new(file),
            Err(err) => {
                log::error!("input file opening error: {}", err);
                process::exit(EXIT_INPUT_ERROR);
            }
        },
        None => Box::new(io::stdin()),
    };

    let sorter: ExternalSorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(EXIT_SORT_ERROR);
        }
    };

    let result = match arg_parser.value_of("output") {
        Some(output) => sorter.sort_to_file(input, path::Path::new(output)),
        None => sorter.sort_to_writer(input, &mut io::stdout().lock()).map(|_| ()),
    };

    if let Err(err) = result {
        log::error!("data sorting error: {}", err);
        process::exit(EXIT_SORT_ERROR);
    }
}

fn value_or_exit<T>(arg_parser: &clap::ArgMatches, name: &str) -> T
where
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    match arg_parser.value_of_t(name) {
        Ok(value) => value,
        Err(err) => {
            let _ = err.print();
            process::exit(EXIT_INVALID_ARGS);
        }
    }
}

/// Converts the requested buffer size, `None` if it does not fit the address space.
fn rw_buf_size(size: ByteSize) -> Option<usize> {
    usize::try_from(size.as_u64()).ok()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser<I, T>(args: I) -> clap::Result<clap::ArgMatches>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    clap::App::new("line-ext-sort")
        .about("sorts lines of text files using bounded memory")
        .arg(
            clap::Arg::new("input")
                .help("file to be sorted, standard input if omitted")
                .index(1),
        )
        .arg(
            clap::Arg::new("output")
                .help("result file, standard output if omitted")
                .index(2),
        )
        .arg(
            clap::Arg::new("limit")
                .short('n')
                .long("limit")
                .help("maximum number of lines per initial chunk")
                .takes_value(true)
                .default_value(DEFAULT_LIMIT)
                .validator(|v| match v.parse::<usize>() {
                    Ok(limit) if limit > 0 => Ok(()),
                    _ => Err(String::from("limit must be positive number")),
                }),
        )
        .arg(
            clap::Arg::new("merge_limit")
                .short('m')
                .long("merge-limit")
                .help("maximum number of files merged at once")
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(limit) if limit > 1 => Ok(()),
                    _ => Err(String::from("merge limit must be greater than one")),
                }),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("buffer_size")
                .short('b')
                .long("buffer-size")
                .help("read/write buffer size")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(size) if size.as_u64() > 0 => Ok(()),
                    Ok(_) => Err(String::from("buffer size must be positive")),
                    Err(err) => Err(format!("buffer size format incorrect: {}", err)),
                }),
        )
        .try_get_matches_from(args)
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
