//! Wire-line assembly for the statsd protocol with InfluxDB extensions.
//!
//! A single metric observation is one line of the form
//! `<key>:<value>|<type>[|@<sample rate>]`, where the key may already carry
//! a namespace prefix and `,name=value` tag suffixes. Lines are fully
//! formatted before they enter the delivery queue and are immutable from
//! that point on.

/// How close a sample rate must be to `1.0` to be treated as unsampled and
/// omitted from the wire line.
const SAMPLE_RATE_EPSILON: f32 = 1e-4;

const SIGNIFICANT_DIGITS: usize = 5;

/// The statsd metric types understood by the wire format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricType {
    /// A counter (`c`), adjusted by signed deltas.
    Counter,

    /// A gauge (`g`), holding the latest fixed reading.
    Gauge,

    /// A timer (`ms`), recording a duration in milliseconds.
    Timer,
}

impl MetricType {
    /// Returns the wire token for this metric type.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Gauge => "g",
            MetricType::Timer => "ms",
        }
    }
}

pub(crate) fn is_unsampled(sample_rate: f32) -> bool {
    (sample_rate - 1.0).abs() < SAMPLE_RATE_EPSILON
}

/// Assembles one complete wire line from an already-formatted key and value.
pub(crate) fn format_line(key: &str, value: &str, metric_type: MetricType, sample_rate: f32) -> String {
    let mut line = String::with_capacity(key.len() + value.len() + 12);
    line.push_str(key);
    line.push(':');
    line.push_str(value);
    line.push('|');
    line.push_str(metric_type.as_str());

    if !is_unsampled(sample_rate) {
        line.push_str("|@");
        line.push_str(&format_compact(f64::from(sample_rate)));
    }

    line
}

pub(crate) fn format_int(value: i64) -> String {
    itoa::Buffer::new().format(value).to_string()
}

/// Renders a float the way C's `%.5g` does: five significant digits with
/// trailing zeros stripped, switching to exponential notation when the
/// decimal exponent falls outside `[-4, 5)`.
pub(crate) fn format_compact(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    // Round to five significant digits up front; the resulting exponent
    // decides between fixed and exponential notation.
    let rounded = format!("{value:.prec$e}", prec = SIGNIFICANT_DIGITS - 1);
    let (mantissa, exponent) = match rounded.split_once('e') {
        Some(parts) => parts,
        None => unreachable!("LowerExp output always carries an exponent"),
    };
    let exponent: i32 = match exponent.parse() {
        Ok(exponent) => exponent,
        Err(_) => unreachable!("LowerExp exponent is always an integer"),
    };

    if (-4..SIGNIFICANT_DIGITS as i32).contains(&exponent) {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exponent).max(0) as usize;
        strip_fraction(format!("{value:.decimals$}"))
    } else {
        let mantissa = strip_fraction(mantissa.to_string());
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn strip_fraction(mut formatted: String) -> String {
    if formatted.contains('.') {
        while formatted.ends_with('0') {
            formatted.pop();
        }
        if formatted.ends_with('.') {
            formatted.pop();
        }
    }
    formatted
}

#[cfg(test)]
mod tests {
    use proptest::proptest;

    use super::{format_compact, format_int, format_line, MetricType};

    #[test]
    fn compact_float_rendering() {
        // Cases are defined as: input value, expected `%.5g` output.
        let cases = [
            (0.0, "0"),
            (0.01, "0.01"),
            (0.1, "0.1"),
            (2.0, "2"),
            (1000.0, "1000"),
            (-42.42, "-42.42"),
            (123.456789, "123.46"),
            (0.999999, "1"),
            (0.000123456, "0.00012346"),
            (0.00001, "1e-05"),
            (1234567.0, "1.2346e+06"),
            (10000000000.0, "1e+10"),
        ];

        for (value, expected) in cases {
            assert_eq!(format_compact(value), expected, "value: {value}");
        }
    }

    #[test]
    fn line_assembly() {
        // Cases are defined as: key, value, type, sample rate, expected line.
        let cases = [
            ("key", "10", MetricType::Counter, 1.0, "key:10|c"),
            ("key", "10", MetricType::Counter, 0.1, "key:10|c|@0.1"),
            ("key", "0.01", MetricType::Gauge, 0.01, "key:0.01|g|@0.01"),
            ("key", "121.2", MetricType::Counter, 2.0, "key:121.2|c|@2"),
            ("ns.key,tag=value", "5", MetricType::Timer, 1.0, "ns.key,tag=value:5|ms"),
            ("key", "1", MetricType::Counter, 0.5, "key:1|c|@0.5"),
        ];

        for (key, value, metric_type, sample_rate, expected) in cases {
            assert_eq!(format_line(key, value, metric_type, sample_rate), expected);
        }
    }

    #[test]
    fn rate_just_inside_epsilon_is_omitted() {
        assert_eq!(format_line("key", "1", MetricType::Counter, 1.00005), "key:1|c");
        assert_eq!(format_line("key", "1", MetricType::Counter, 0.99995), "key:1|c");
    }

    #[test]
    fn integer_rendering() {
        assert_eq!(format_int(0), "0");
        assert_eq!(format_int(-1), "-1");
        assert_eq!(format_int(279172897979), "279172897979");
    }

    proptest! {
        #[test]
        fn rates_within_epsilon_never_append(rate in 0.99995f32..1.00005f32) {
            let line = format_line("key", "1", MetricType::Counter, rate);
            assert_eq!(line, "key:1|c");
        }

        #[test]
        fn rates_away_from_one_always_append(rate in 0.01f32..0.99f32) {
            let line = format_line("key", "1", MetricType::Counter, rate);
            assert!(line.starts_with("key:1|c|@"));
        }
    }
}
