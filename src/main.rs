//! Command-line front end.
//!
//! Usage: `swarmbench [preset] [workload] [backend]`
//!
//! - preset: `quick`, `standard` (default), or `stress`
//! - workload: `gemm` (default) or `particle`
//! - backend: `auto` (default), `gpu`, `cpu`, or `passive`
//!
//! Runs one benchmark to completion and prints the result record as JSON.

use std::env;
use std::process::ExitCode;

use swarmbench::{
    BackendPreference, BenchConfig, BenchSession, MemoryBaselines, NvidiaSmi, WorkloadKind,
};

fn usage() {
    eprintln!("usage: swarmbench [quick|standard|stress] [gemm|particle] [auto|gpu|cpu|passive]");
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage();
        return ExitCode::SUCCESS;
    }

    let preset = args.get(1).map(String::as_str).unwrap_or("standard");
    let workload = match args.get(2).map(String::as_str) {
        None | Some("gemm") => WorkloadKind::Gemm,
        Some("particle") => WorkloadKind::Particle,
        Some(other) => {
            eprintln!("unknown workload: {}", other);
            usage();
            return ExitCode::FAILURE;
        }
    };
    let backend = match args.get(3).map(String::as_str) {
        None | Some("auto") => BackendPreference::Auto,
        Some("gpu") => BackendPreference::Gpu,
        Some("cpu") => BackendPreference::Cpu,
        Some("passive") => BackendPreference::Passive,
        Some(other) => {
            eprintln!("unknown backend: {}", other);
            usage();
            return ExitCode::FAILURE;
        }
    };

    let config = BenchConfig::from_mode(preset, workload).with_backend(backend);
    println!(
        "[bench] {} run, {:.0}s, sampling every {}ms",
        config.mode, config.duration_secs, config.sample_interval_ms
    );

    let session = BenchSession::new(
        Box::new(NvidiaSmi::new()),
        Box::new(MemoryBaselines::new()),
    );
    match session.start(config) {
        Ok(result) => {
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("[bench] failed to serialize result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[bench] {}", e);
            ExitCode::FAILURE
        }
    }
}
