//! Recover the password of an RC4 encrypted PDF.
//!
//! Usage:
//!   pdf_recover -f FILE [-w WORDLIST | -c CHARSET -n MIN -m MAX] [options]
//!
//! Progress is logged every 20 seconds; set RUST_LOG=debug for more detail.

use std::path::PathBuf;
use std::time::Duration;

use pdf_recover::candidates::{BruteForce, CandidateSupplier, Wordlist, DEFAULT_CHARSET};
use pdf_recover::driver::{self, RecoveryReport};
use pdf_recover::engine::{Checkpoint, PermutationKind};
use pdf_recover::extract::extract_from_file;
use pdf_recover::{CrackConfig, EncryptionParameters};

const USAGE: &str = "\
Usage: pdf_recover -f FILE [options]

  -f, --file FILE            encrypted PDF
  -w, --wordlist FILE        read candidates from FILE, one per line
  -c, --charset CHARS        brute-force alphabet (default a-zA-Z0-9)
  -n, --minpw N              shortest brute-force candidate (default 0)
  -m, --maxpw N              longest brute-force candidate (default 32)
  -u, --user                 search the user password
  -p, --password PASSWORD    known user password (owner search only)
  -s, --permutate            also try each candidate with its first letter upper-cased
      --all-case N           try every case combination of the first N letters
      --user-fallback        search the user password if the owner search fails
  -j, --workers N            worker threads, 0 = one per core (default 1)
  -l, --load-state FILE      resume from a checkpoint
      --save-state FILE      write checkpoints to FILE
      --save-every SECS      checkpoint interval (default 60)
      --progress-every SECS  progress interval (default 20)
  -h, --help                 show this text";

struct Args {
    file: PathBuf,
    wordlist: Option<PathBuf>,
    charset: Vec<u8>,
    min_len: usize,
    max_len: usize,
    load_state: Option<PathBuf>,
    config: CrackConfig,
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i).map(String::as_str).ok_or_else(|| format!("{} needs a value", flag))
}

fn number<T: std::str::FromStr>(text: &str, flag: &str) -> Result<T, String> {
    text.parse().map_err(|_| format!("{}: '{}' is not a number", flag, text))
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut file = None;
        let mut wordlist = None;
        let mut charset = DEFAULT_CHARSET.to_vec();
        let mut min_len = 0;
        let mut max_len = 32;
        let mut load_state = None;
        let mut save_state = None;
        let mut save_every = 60;
        let mut config = CrackConfig::new();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "-f" | "--file" => file = Some(PathBuf::from(value(&args, &mut i, flag)?)),
                "-w" | "--wordlist" => wordlist = Some(PathBuf::from(value(&args, &mut i, flag)?)),
                "-c" | "--charset" => charset = value(&args, &mut i, flag)?.as_bytes().to_vec(),
                "-n" | "--minpw" => min_len = number(value(&args, &mut i, flag)?, flag)?,
                "-m" | "--maxpw" => max_len = number(value(&args, &mut i, flag)?, flag)?,
                "-u" | "--user" => config = config.with_working_as_user(true),
                "-p" | "--password" => {
                    config = config.with_known_password(value(&args, &mut i, flag)?)
                },
                "-s" | "--permutate" => config = config.with_permutation(PermutationKind::FirstChar),
                "--all-case" => {
                    let max_positions = number(value(&args, &mut i, flag)?, flag)?;
                    config = config.with_permutation(PermutationKind::AllCase { max_positions });
                },
                "--user-fallback" => config = config.with_user_fallback(true),
                "-j" | "--workers" => {
                    config = config.with_workers(number(value(&args, &mut i, flag)?, flag)?)
                },
                "-l" | "--load-state" => {
                    load_state = Some(PathBuf::from(value(&args, &mut i, flag)?))
                },
                "--save-state" => save_state = Some(PathBuf::from(value(&args, &mut i, flag)?)),
                "--save-every" => save_every = number(value(&args, &mut i, flag)?, flag)?,
                "--progress-every" => {
                    let secs = number(value(&args, &mut i, flag)?, flag)?;
                    config = config.with_progress_interval(Duration::from_secs(secs));
                },
                "-h" | "--help" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                },
                other => return Err(format!("unknown option '{}'", other)),
            }
            i += 1;
        }

        if let Some(path) = save_state {
            config = config.with_checkpoint(path, Duration::from_secs(save_every));
        }
        if charset.is_empty() {
            return Err("empty charset".to_string());
        }
        if min_len > max_len {
            return Err(format!("--minpw {} is larger than --maxpw {}", min_len, max_len));
        }

        Ok(Self {
            file: file.ok_or("no file given (-f)")?,
            wordlist,
            charset,
            min_len,
            max_len,
            load_state,
            config,
        })
    }

    fn supplier(&self) -> pdf_recover::Result<Box<dyn CandidateSupplier>> {
        Ok(match &self.wordlist {
            Some(path) => Box::new(Wordlist::open(path)?),
            None => Box::new(BruteForce::new(&self.charset, self.min_len, self.max_len)),
        })
    }
}

fn describe(params: &EncryptionParameters) {
    println!("Standard Security Handler");
    println!("  Revision: {}, Version: {}", params.revision, params.version);
    println!("  Key length: {} bits", params.key_length_bits);
    println!("  Permissions: {} ({})", params.permissions, params.permission_flags());
    println!("  Encrypt metadata: {}", params.encrypt_metadata);
}

fn print_report(report: &RecoveryReport) {
    match (report.owner_password(), report.user_password()) {
        (Some(owner), Some(user)) => {
            println!("found user-password: '{}'", String::from_utf8_lossy(user));
            println!("found owner-password: '{}'", String::from_utf8_lossy(owner));
        },
        (Some(owner), None) => {
            println!("found owner-password: '{}'", String::from_utf8_lossy(owner))
        },
        (None, Some(user)) => println!("found user-password: '{}'", String::from_utf8_lossy(user)),
        (None, None) => println!("Could not find password"),
    }
    let phases = report.owner.iter().chain(report.user.iter());
    let (tested, secs) = phases.fold((0, 0.0), |(n, s), p| {
        (n + p.total_processed, s + p.elapsed.as_secs_f64())
    });
    println!("Tested {} candidates in {:.1}s", tested, secs);
}

fn run(args: &Args) -> pdf_recover::Result<RecoveryReport> {
    let params = extract_from_file(&args.file)?;
    describe(&params);

    match &args.load_state {
        Some(path) => {
            let checkpoint = Checkpoint::load(path)?;
            let mut supplier = args.supplier()?;
            let phase = driver::resume(&params, &checkpoint, supplier.as_mut(), &args.config)?;
            let mut report = RecoveryReport::default();
            if checkpoint.working_as_user {
                report.user = Some(phase);
            } else {
                report.owner = Some(phase);
            }
            Ok(report)
        },
        None => driver::recover(&params, &args.config, || args.supplier()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        },
    };

    match run(&args) {
        Ok(report) => {
            print_report(&report);
            if report.owner_password().is_none() && report.user_password().is_none() {
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        },
    }
}
