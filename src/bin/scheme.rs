//! `scheme` - an interpreter for mini-scheme programs.

use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use mini_scheme::driver;

#[derive(Debug, StructOpt)]
#[structopt(name = "scheme", about = "Interpreting mini-scheme programs")]
struct Opt {
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,

    /// The source file to run. Starts an interactive REPL if omitted.
    #[structopt(parse(from_os_str))]
    file: Option<PathBuf>,
}

fn main() {
    let opt = Opt::from_args();

    let level = if opt.verbose {
        log::Level::Trace
    } else {
        log::Level::Info
    };
    simple_logger::init_with_level(level).unwrap();

    match opt.file {
        None => {
            // The REPL otherwise has no way to exit with status 0 on Ctrl-C;
            // left to the default disposition, SIGINT would terminate the
            // process via the signal rather than a clean exit.
            ctrlc::set_handler(|| process::exit(0)).expect("failed to install SIGINT handler");
            driver::run_repl_on_stdio();
        }
        Some(path) => {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    log::error!("{}: {}", path.display(), err);
                    process::exit(1);
                }
            };
            let name = path.to_string_lossy();
            if driver::run_script(&name, &source).is_err() {
                process::exit(1);
            }
        }
    }
}
