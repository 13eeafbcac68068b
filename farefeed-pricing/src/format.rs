use chrono::{DateTime, Datelike, Utc};
use std::fmt::Write;

use farefeed_core::{Flight, FlightSearcher};

use crate::TravelpayoutsClient;

/// At most this many options go into one chat message.
const MAX_MESSAGE_FLIGHTS: usize = 3;

const MONTHS: [&str; 12] = [
    "янв", "фев", "мар", "апр", "май", "июн", "июл", "авг", "сен", "окт", "ноя", "дек",
];

/// Render the chat-facing HTML message for a route and its cheapest options.
pub fn flight_message(
    client: &TravelpayoutsClient,
    origin_city: &str,
    dest_city: &str,
    flights: &[Flight],
    passengers: u32,
) -> String {
    if flights.is_empty() {
        return format!(
            "😔 К сожалению, билеты {} → {} не найдены",
            origin_city, dest_city
        );
    }

    let mut msg = String::new();
    let _ = writeln!(msg, "✈️ <b>{} → {}</b>\n", origin_city, dest_city);

    for flight in flights.iter().take(MAX_MESSAGE_FLIGHTS) {
        let _ = writeln!(msg, "🎫 <b>{}</b>", format_price(flight.price));
        let _ = writeln!(
            msg,
            "📅 {} → {}",
            format_date(flight.depart_date),
            format_date(flight.return_date)
        );
        let _ = write!(msg, "🛫 {}", flight.airline);
        if flight.duration > 0 {
            let _ = write!(msg, " • {}", format_duration(flight.duration));
        }
        msg.push('\n');

        let link = client.partner_link(flight, passengers);
        let _ = writeln!(msg, "🔗 <a href=\"{}\">Купить билет</a>\n", link);
    }

    msg.push_str("💡 <i>Цены указаны за одного пассажира в обе стороны</i>");
    msg
}

/// "15000" -> "15 000 ₽".
pub fn format_price(price: i64) -> String {
    let digits = price.to_string();
    let mut out = String::new();
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(digit);
    }
    out.push_str(" ₽");
    out
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => format!("{} {}", d.day(), MONTHS[d.month0() as usize]),
        None => String::new(),
    }
}

/// Minutes -> "4ч 05м".
pub fn format_duration(minutes: i64) -> String {
    format!("{}ч {:02}м", minutes / 60, minutes % 60)
}
