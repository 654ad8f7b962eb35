// Copyright 2018 Google Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Command-line entry point for the mongofs FUSE file system.

extern crate env_logger;
#[macro_use] extern crate failure;
extern crate getopts;
extern crate mongofs;

use failure::Error;
use getopts::Options;
use std::env;
use std::path::Path;
use std::process;

/// Execution failure due to invalid command-line arguments.
#[derive(Debug, Fail)]
#[fail(display = "{}", message)]
struct UsageError {
    message: String,
}

/// Prints program usage information on stdout.
fn usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] MOUNT_POINT", program);
    print!("{}", opts.usage(&brief));
}

fn program_main(program: &str, args: &[String]) -> Result<(), Error> {
    let mut opts = Options::new();
    opts.optflag("h", "help", "prints usage information");
    opts.optmulti("o", "",
        "mount options: host=HOST, hide_id, fetch_file_length, json_escaping, \
         json_encoding=ENCODING, json_indent=N",
        "OPT[,OPT...]");
    let matches = opts.parse(args)?;

    if matches.opt_present("h") {
        usage(program, &opts);
        return Ok(());
    }

    if matches.free.len() != 1 {
        return Err(Error::from(UsageError {
            message: "expected exactly one mount point".to_owned(),
        }));
    }
    let mount_point = &matches.free[0];

    let options: Vec<String> = matches.opt_strs("o")
        .iter()
        .flat_map(|group| group.split(','))
        .filter(|option| !option.is_empty())
        .map(|option| option.to_owned())
        .collect();
    let config = mongofs::Config::parse(&options)?;

    mongofs::mount(config, Path::new(mount_point), Box::new(mongofs::notify::LogNotifier))
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();
    if let Err(err) = program_main(&program, &args[1..]) {
        eprintln!("{}: {}", program, err);
        process::exit(1);
    }
}
