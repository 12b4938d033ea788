use {cortex_flowdock::ReplyOutcome, cortex_intent::TemperatureUnit};

/// Celsius to Fahrenheit, truncating.
pub fn c_to_f(celsius: i64) -> i64 {
    celsius.saturating_mul(9) / 5 + 32
}

/// Fahrenheit to Celsius, truncating.
///
/// Converting back with [`c_to_f`] can land up to 2°F away from the input,
/// since one Celsius degree spans 1.8°F.
pub fn f_to_c(fahrenheit: i64) -> i64 {
    fahrenheit.saturating_sub(32).saturating_mul(5) / 9
}

/// Convert to the other unit.
pub fn convert(degrees: i64, unit: TemperatureUnit) -> (i64, TemperatureUnit) {
    let converted = match unit {
        TemperatureUnit::Celsius => c_to_f(degrees),
        TemperatureUnit::Fahrenheit => f_to_c(degrees),
    };
    (converted, unit.inverse())
}

pub fn reply(degrees: i64, unit: TemperatureUnit) -> ReplyOutcome {
    let (converted, target) = convert(degrees, unit);
    ReplyOutcome::message(format!("Which is {converted}{}", target.label()))
}
