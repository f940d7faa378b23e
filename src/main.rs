use std::io::Read;
use std::process::ExitCode;

use shift_planner::models::{ScheduleRequest, ScheduleResponse};

fn main() -> ExitCode {
    // Initialize logging first, before anything else
    if let Err(e) = shift_planner::logger::init() {
        eprintln!("Failed to initialize logger: {}", e);
        // Continue anyway - scheduling still works without logging
    }

    let args: Vec<String> = std::env::args().collect();
    let raw = match args.get(1).map(String::as_str) {
        None | Some("-") => {
            let mut buffer = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
                eprintln!("Failed to read request from stdin: {}", e);
                return ExitCode::FAILURE;
            }
            buffer
        }
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                eprintln!("Failed to read request file '{}': {}", path, e);
                return ExitCode::FAILURE;
            }
        },
    };

    let request: ScheduleRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(e) => {
            let response = ScheduleResponse::Error {
                error: format!("invalid input: {}", e),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&response).expect("serialize error response")
            );
            return ExitCode::FAILURE;
        }
    };

    let response = shift_planner::generate_schedule(&request);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).expect("serialize response")
    );

    match response {
        ScheduleResponse::Error { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
