#[macro_use]
extern crate num_derive;
extern crate num_traits;

use std::env;
use std::process::exit;

use peach::interpreted::prompt::run_prompt;
use peach::interpreted::runfile::{run_file, RunOptions};

pub mod peach;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: peach [script]");
        exit(64);
    } else if args.len() == 2 {
        if !run_file(&args[1], &RunOptions::from_env()) {
            exit(65);
        }
    } else {
        run_prompt();
    }
}
