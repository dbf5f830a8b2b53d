//! # Remes
//!
//! Command-line front-end for the RemesPath query engine: compiles a query,
//! runs it against a JSON document, and prints the result.

mod cli;

use cli::*;

use std::{error::Error, fs, io::Read};

use log::{debug, error};
use remespath::{Json, RemesParser};
use simple_logger::SimpleLogger;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::init();

    SimpleLogger::new().with_level(args.verbosity).init().unwrap();

    let mut parser = RemesParser::new();
    let compiled = match parser.compile(&args.query) {
        Ok(compiled) => compiled,
        Err(e) => {
            error!("{e}");
            std::process::exit(-1);
        }
    };

    let result = if let Json::CurJson(_) = &compiled {
        let text = match &args.input {
            Some(path) => fs::read_to_string(path)?,
            None => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            }
        };
        let input = Json::parse(&text)?;
        debug!("parsed the input document, applying the query");

        match remespath::apply(&compiled, &input) {
            Ok(result) => result,
            Err(e) => {
                error!("{e}");
                std::process::exit(-1);
            }
        }
    } else {
        debug!("the query is constant, no input needed");
        compiled
    };

    if args.compact {
        println!("{result}");
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
