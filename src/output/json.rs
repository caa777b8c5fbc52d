use crate::error::BrokerError;

pub fn print_ok<T: serde::Serialize>(value: &T) {
    let envelope = serde_json::json!({ "success": true, "data": value });
    match serde_json::to_string_pretty(&envelope) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

pub fn print_err(err: &BrokerError) {
    let envelope = serde_json::json!({
        "success": false,
        "error": { "code": err.code.as_str(), "message": err.message },
    });
    eprintln!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| err.message.clone()));
}
