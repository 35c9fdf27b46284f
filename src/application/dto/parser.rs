// src/application/dto/parser.rs
// Parsers for feed frames

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use super::TradeFrame;
use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::model::TradeEvent;

const TRADE_EVENT_TYPE: &str = "trade";

/// Parse one text frame from the feed.
///
/// Returns `Ok(None)` for frames that are well-formed but not trades
/// (subscription acks, heartbeats). Combined-stream envelopes
/// (`{"stream": ..., "data": {...}}`) are unwrapped first.
pub fn parse_trade_frame(message: &str) -> ParseResult<Option<TradeEvent>> {
    let mut value: Value = serde_json::from_str(message)?;

    if value.get("stream").is_some() {
        let inner = value.get_mut("data").map(Value::take);
        if let Some(inner) = inner {
            value = inner;
        }
    }

    let is_trade = value
        .get("e")
        .and_then(Value::as_str)
        .map_or(false, |event_type| event_type == TRADE_EVENT_TYPE);
    if !is_trade {
        return Ok(None);
    }

    let frame: TradeFrame = serde_json::from_value(value)?;
    frame.into_event().map(Some)
}

impl TradeFrame {
    pub fn into_event(self) -> ParseResult<TradeEvent> {
        let parse_decimal = |value: &str, field: &'static str| -> ParseResult<Decimal> {
            Decimal::from_str(value).map_err(|_| ParseError::InvalidNumber {
                field,
                value: value.to_string(),
            })
        };

        let price = parse_decimal(&self.price, "price")?;
        let quantity = parse_decimal(&self.quantity, "quantity")?;
        let event_time = DateTime::from_timestamp_millis(self.trade_time)
            .ok_or(ParseError::InvalidTimestamp(self.trade_time))?;

        Ok(TradeEvent::new(self.symbol, price, quantity, event_time)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_trade_frame() {
        let frame = r#"{"e":"trade","s":"BTCUSDT","p":"65000.50000000","q":"0.01230000","T":1700000000000}"#;
        let event = parse_trade_frame(frame).unwrap().unwrap();

        assert_eq!(event.symbol(), "BTCUSDT");
        assert_eq!(event.price(), dec!(65000.50000000));
        assert_eq!(event.quantity(), dec!(0.01230000));
        assert_eq!(event.event_time().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn parses_full_binance_payload() {
        let frame = r#"{
            "e": "trade",
            "E": 1672515782136,
            "s": "ETHUSDT",
            "t": 12345,
            "p": "2300.10",
            "q": "1.5",
            "T": 1672515782130,
            "m": true,
            "M": true
        }"#;
        let event = parse_trade_frame(frame).unwrap().unwrap();

        assert_eq!(event.symbol(), "ETHUSDT");
        assert_eq!(event.event_time().timestamp_millis(), 1_672_515_782_130);
    }

    #[test]
    fn unwraps_combined_stream_envelope() {
        let frame = r#"{"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT","p":"1.0","q":"2.0","T":1700000000000}}"#;
        let event = parse_trade_frame(frame).unwrap().unwrap();
        assert_eq!(event.quantity(), dec!(2));
    }

    #[test]
    fn ignores_non_trade_messages() {
        assert!(parse_trade_frame(r#"{"result":null,"id":1}"#).unwrap().is_none());
        assert!(parse_trade_frame(r#"{"e":"aggTrade","s":"BTCUSDT"}"#).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_price() {
        let frame = r#"{"e":"trade","s":"BTCUSDT","q":"0.1","T":1700000000000}"#;
        assert!(matches!(parse_trade_frame(frame), Err(ParseError::Json(_))));
    }

    #[test]
    fn rejects_non_numeric_quantity() {
        let frame = r#"{"e":"trade","s":"BTCUSDT","p":"10","q":"lots","T":1700000000000}"#;
        match parse_trade_frame(frame) {
            Err(ParseError::InvalidNumber { field, value }) => {
                assert_eq!(field, "quantity");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_zero_price() {
        let frame = r#"{"e":"trade","s":"BTCUSDT","p":"0","q":"1","T":1700000000000}"#;
        assert!(matches!(parse_trade_frame(frame), Err(ParseError::InvalidTrade(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_trade_frame("not json"), Err(ParseError::Json(_))));
    }
}
