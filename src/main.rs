// pl0 - code generator and stack machine
// Runs a checked program tree, serialised as TOML, on the stack machine

use std::env;
use std::fs;
use std::process;

use log::{debug, info};

use pl0::compiler::tree::ProgramNode;
use pl0::compiler::Compiler;
use pl0::config::MachineConfig;
use pl0::console::StdConsole;
use pl0::interpreter::StackMachine;
use pl0::reporter::ErrorReporter;
use pl0::trace::TraceSet;

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut config_file = None;
    let mut verbose = false;
    let mut trace = false;
    let mut check_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -c requires a filename");
                    process::exit(1);
                }
                config_file = Some(args[i + 1].clone());
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-t" | "--trace" => {
                trace = true;
                i += 1;
            }
            "--check" => {
                check_only = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut config = match &config_file {
        Some(path) => match MachineConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error in configuration '{}': {}", path, err);
                process::exit(1);
            }
        },
        None => MachineConfig::default(),
    };
    if verbose {
        config.listing = true;
    }
    if trace {
        config.trace = TraceSet::all();
    }
    debug!("machine configuration: {:?}", config);

    // Read program tree
    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };
    let program: ProgramNode = match toml::from_str(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("Error in program '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    let mut reporter = ErrorReporter::new();
    let procedures =
        match Compiler::with_code_start(config.code_start).compile(&program, &mut reporter) {
            Ok(procedures) => procedures,
            Err(err) => {
                eprintln!("Compilation error: {}", err);
                process::exit(1);
            }
        };
    if check_only {
        info!("code generated for {} procedures", procedures.len());
        if verbose {
            print!("{}", procedures);
        }
        return;
    }

    let mut machine = match StackMachine::new(&config, procedures, StdConsole::new()) {
        Ok(machine) => machine,
        Err(err) => {
            eprintln!("Load error: {}", err);
            process::exit(1);
        }
    };
    if verbose {
        println!("Running ...");
    }
    machine.run(&mut reporter);
    info!("{} runtime errors", reporter.runtime_errors().len());
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <program.toml>", program_name);
    println!();
    println!("Options:");
    println!("  -c, --config <file>    Machine configuration (TOML)");
    println!("  -v, --verbose          Print the code listing");
    println!("  -t, --trace            Trace execution (all categories)");
    println!("  --check                Generate code without running it");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Examples:");
    println!("  {} factorial.toml", program_name);
    println!("  {} -c machine.toml -t factorial.toml", program_name);
}
