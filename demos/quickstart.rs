use std::fs;
use std::io;
use std::path;

use bytesize::KB;
use env_logger;
use log;

use line_ext_sort::{ExternalSorter, ExternalSorterBuilder, LimitedBufferBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());

    let sorter: ExternalSorter = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_buffer(LimitedBufferBuilder::new(100_000, true))
        .with_merge_limit(16)
        .with_rw_buf_size((64 * KB) as usize)
        .build()
        .unwrap();

    sorter.sort_to_file(input_reader, path::Path::new("output.txt")).unwrap();
}
