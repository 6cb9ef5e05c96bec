//! Print the OpenAPI document for the service, for spec diffing in CI and
//! client generation.

use shepherd::api;

fn main() {
    match api::openapi().to_pretty_json() {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("Failed to render OpenAPI document: {err}");
            std::process::exit(1);
        }
    }
}
