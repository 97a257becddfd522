use std::env;
use std::io;

use uhs_reader::{AuxPolicy, UhsParser};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-uhs-file> [--aux normal|ignore|nest]", args[0]);
        std::process::exit(1);
    }

    let uhs_path = &args[1];
    let mut aux = AuxPolicy::Normal;
    // Parse --aux argument
    if let Some(aux_idx) = args.iter().position(|arg| arg == "--aux") {
        match args.get(aux_idx + 1).map(String::as_str) {
            Some("normal") => aux = AuxPolicy::Normal,
            Some("ignore") => aux = AuxPolicy::Ignore,
            Some("nest") => aux = AuxPolicy::Nest,
            Some(other) => {
                eprintln!("ERROR: Unknown aux style {:?}. Expected normal, ignore, or nest.", other);
                std::process::exit(1);
            }
            None => {
                eprintln!("ERROR: --aux flag requires an argument.");
                std::process::exit(1);
            }
        }
    }

    println!("Reading UHS file: {}", uhs_path);
    println!("{}", "=".repeat(60));

    match UhsParser::new().aux_policy(aux).parse(uhs_path) {
        Ok(root) => {
            println!("\n{}", "=".repeat(60));
            println!("SUCCESS! Parsing completed.");
            println!("{}", "=".repeat(60));

            println!("\nHint File Information:");
            println!("  Title: {}", root.title());

            println!("\nStatistics:");
            println!("  Top-level nodes: {}", root.child_count());
            println!("  Link targets: {}", root.link_count());

            println!("\nNode Tree:");
            let mut out = io::stdout();
            if let Err(e) = root.write_tree(&mut out) {
                eprintln!("ERROR: Failed to print the tree: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("\nERROR: Failed to read UHS file");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
