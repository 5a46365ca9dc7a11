use crate::timestamp::{DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};

const MAX_UNITS: usize = 3;

#[allow(clippy::cast_sign_loss)]
const UNITS: [(&str, u64); 7] = [
    ("year", (DAY_MS * 365 + DAY_MS / 4) as u64),
    ("month", (DAY_MS * 30 + DAY_MS * 7 / 16) as u64),
    ("week", (DAY_MS * 7) as u64),
    ("day", DAY_MS as u64),
    ("hour", HOUR_MS as u64),
    ("minute", MINUTE_MS as u64),
    ("second", SECOND_MS as u64),
];

/// Render a millisecond span with up to three of its largest units,
/// e.g. `1 day` or `1 hour, 30 minutes`. The sign is ignored.
#[must_use]
pub fn humanize(millis: i64) -> String {
    let mut remaining = millis.unsigned_abs();
    let mut parts = Vec::with_capacity(MAX_UNITS);
    for (unit, size) in UNITS {
        let amount = remaining / size;
        if amount > 0 {
            remaining -= amount * size;
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {unit}{plural}"));
            if parts.len() == MAX_UNITS {
                break;
            }
        }
    }
    if parts.is_empty() {
        "0 seconds".to_owned()
    } else {
        parts.join(", ")
    }
}
