//! `siftc` entry point.

fn main() {
    std::process::exit(sift::cli::run_cli());
}
