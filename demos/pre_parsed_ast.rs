use mathfn_rs::ast::{Bindings, Evaluator, Parser};
use std::collections::HashMap;

fn main() {
    pretty_env_logger::init();

    let evaluator = Evaluator::new();

    let expression = "k * sin(x) / (1 + x**2)";
    let ast = match Parser::parse_expression(expression) {
        Ok(ast) => ast,
        Err(err) => {
            eprintln!("Error: {}", err);
            return;
        }
    };
    println!("AST: {:?}", ast);

    let params = HashMap::from([("k".to_string(), 3.0)]);
    for x in [0.0, 0.5, 1.0, 2.0] {
        match evaluator.evaluate(&ast, &Bindings::new(x, &params)) {
            Ok(result) => println!("x = {}: {}", x, result),
            Err(err) => println!("Error: {}", err),
        }
    }

    match Parser::parse_expression("k * (x +") {
        Ok(_) => {}
        Err(err) => println!("Rejected: {}", err),
    }
}
