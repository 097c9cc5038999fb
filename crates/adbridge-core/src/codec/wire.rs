// # Wire Schema
//
// Explicit field-by-field decoder for native notifications. Known keys are
// mapped to typed fields; unknown keys are flagged in the log and ignored.
//
// Failure policy:
// - envelope problems (not an object, missing/ill-typed `callback` or
//   `placement_id`, unknown tag, foreign schema version) fail the decode
// - impression problems never do: a bad analytics field is treated as
//   absent and the rest of the record is kept

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{CallbackTag, Event, EventKind};
use crate::error::DecodeError;
use crate::impression::{ImpressionRecord, PlacementType, PriceAccuracy};
use crate::traits::AdFormat;

/// Schema version this decoder speaks; payloads without a version are v1
pub const SCHEMA_VERSION: u16 = 1;

const ENVELOPE_KEYS: &[&str] = &[
    "schema_version",
    "callback",
    "placement_id",
    "error",
    "impression_data",
];

const IMPRESSION_KEYS: &[&str] = &[
    "advertiserDomain",
    "campaignId",
    "countryCode",
    "creativeId",
    "currency",
    "demandSource",
    "impressionDepth",
    "impressionId",
    "netPayout",
    "networkInstanceId",
    "renderingSDK",
    "renderingSDKVersion",
    "priceAccuracy",
    "placementType",
    "variantId",
];

const UNSPECIFIED_ERROR: &str = "unspecified error";

/// Decode a native payload with no ad format context
///
/// An impression without `placementType` defaults to `Banner`, the native
/// layer's zero value.
pub fn decode(raw: &str) -> Result<Event, DecodeError> {
    decode_envelope(raw, None)
}

/// Decode a native payload that arrived on the `format` channel
///
/// An impression without `placementType` takes the channel's format.
pub fn decode_from(format: AdFormat, raw: &str) -> Result<Event, DecodeError> {
    decode_envelope(raw, Some(format))
}

/// Canonical encoding of an event
///
/// `decode(&encode(&event)) == Ok(event)` holds for every event the codec
/// can produce.
pub fn encode(event: &Event) -> String {
    let tag = event.tag();
    let mut envelope = Map::new();
    envelope.insert("callback".into(), json!(tag.as_str()));
    envelope.insert("placement_id".into(), json!(event.placement_id));
    if let Some(message) = event.error_message() {
        envelope.insert("error".into(), json!(message));
    }
    if let Some(impression) = event.impression() {
        envelope.insert("impression_data".into(), encode_impression(impression));
    }
    Value::Object(envelope).to_string()
}

fn decode_envelope(raw: &str, context: Option<AdFormat>) -> Result<Event, DecodeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| DecodeError::Malformed(format!("not valid JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::Malformed("payload is not an object".into()));
    };

    let version = match fields.get("schema_version") {
        None | Some(Value::Null) => SCHEMA_VERSION,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| DecodeError::Malformed(format!("bad schema_version: {n}")))?,
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "schema_version must be a number, got {other}"
            )));
        }
    };
    if version != SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    flag_unknown_keys("envelope", &fields, ENVELOPE_KEYS);

    let tag: CallbackTag = required_str(&fields, "callback")?.parse()?;
    let placement_id = required_str(&fields, "placement_id")?.to_string();

    let error_message = match fields.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };
    if error_message.is_some() && !tag.carries_error() {
        debug!(callback = %tag, %placement_id, "ignoring error field on non-error event");
    }

    let impression = match fields.get("impression_data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(data)) if tag.carries_impression() => {
            Some(decode_impression(data, context))
        }
        Some(Value::Object(_)) => {
            debug!(callback = %tag, %placement_id, "ignoring impression_data on event that cannot carry one");
            None
        }
        Some(other) => {
            warn!(callback = %tag, %placement_id, "impression_data is not an object: {}", other);
            None
        }
    };

    let message = || error_message.clone().unwrap_or_else(|| UNSPECIFIED_ERROR.to_string());
    let kind = match tag {
        CallbackTag::Available => EventKind::Available,
        CallbackTag::Unavailable => EventKind::Unavailable,
        CallbackTag::RequestStarted => EventKind::RequestStarted,
        CallbackTag::Loaded => EventKind::Loaded,
        CallbackTag::Shown => EventKind::Shown { impression },
        CallbackTag::Clicked => EventKind::Clicked { impression },
        CallbackTag::Hidden => EventKind::Hidden { impression },
        CallbackTag::Failed => EventKind::Failed {
            error_message: message(),
        },
        CallbackTag::Error => EventKind::Error {
            error_message: message(),
        },
        CallbackTag::RewardedComplete => EventKind::RewardedComplete { impression },
        CallbackTag::RewardedIncomplete => EventKind::RewardedIncomplete { impression },
    };

    Ok(Event { placement_id, kind })
}

fn required_str<'a>(fields: &'a Map<String, Value>, key: &'static str) -> Result<&'a str, DecodeError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(key)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DecodeError::Malformed(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

fn flag_unknown_keys(scope: &str, fields: &Map<String, Value>, known: &[&str]) {
    for key in fields.keys().filter(|k| !known.contains(&k.as_str())) {
        debug!(scope, key = %key, "unknown key in native payload");
    }
}

fn decode_impression(data: &Map<String, Value>, context: Option<AdFormat>) -> ImpressionRecord {
    flag_unknown_keys("impression_data", data, IMPRESSION_KEYS);

    let text = |key: &str| optional_text(data, key);

    let placement_type = data
        .get("placementType")
        .and_then(|v| enum_field(v, "placementType", PlacementType::from_ordinal, PlacementType::from_name))
        .or_else(|| context.map(AdFormat::placement_type))
        .unwrap_or_default();

    let price_accuracy = data
        .get("priceAccuracy")
        .and_then(|v| enum_field(v, "priceAccuracy", PriceAccuracy::from_ordinal, PriceAccuracy::from_name))
        .unwrap_or_default();

    let impression_depth = match data.get("impressionDepth") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(depth) if depth < 0 => {
                warn!(depth, "negative impressionDepth, clamping to 0");
                0
            }
            Some(depth) => u32::try_from(depth).unwrap_or(u32::MAX),
            None => {
                warn!("impressionDepth is not an integer: {}", n);
                0
            }
        },
        Some(other) => {
            warn!("impressionDepth is not a number: {}", other);
            0
        }
    };

    // Payouts are decimal strings; tolerate a bare number.
    let net_payout = match data.get("netPayout") {
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => text("netPayout"),
    };

    ImpressionRecord::builder(placement_type)
        .advertiser_domain(text("advertiserDomain"))
        .campaign_id(text("campaignId"))
        .country_code(text("countryCode"))
        .creative_id(text("creativeId"))
        .currency(text("currency"))
        .demand_source(text("demandSource"))
        .impression_depth(impression_depth)
        .impression_id(text("impressionId"))
        .net_payout(net_payout)
        .network_instance_id(text("networkInstanceId"))
        .rendering_sdk(text("renderingSDK"))
        .rendering_sdk_version(text("renderingSDKVersion"))
        .price_accuracy(price_accuracy)
        .variant_id(text("variantId"))
        .build()
}

/// String field; empty strings and wrong types count as absent
fn optional_text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            warn!(key, "expected a string in impression_data, got {}", other);
            None
        }
    }
}

fn enum_field<T>(
    value: &Value,
    key: &str,
    from_ordinal: fn(i64) -> Option<T>,
    from_name: fn(&str) -> Option<T>,
) -> Option<T> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().and_then(from_ordinal),
        Value::String(s) => from_name(s),
        Value::Null => return None,
        _ => None,
    };
    if parsed.is_none() {
        warn!(key, "unrecognized value in impression_data: {}", value);
    }
    parsed
}

fn encode_impression(record: &ImpressionRecord) -> Value {
    let mut data = Map::new();
    let mut put = |key: &str, value: Option<&str>| {
        if let Some(value) = value {
            data.insert(key.to_string(), json!(value));
        }
    };
    put("advertiserDomain", record.advertiser_domain());
    put("campaignId", record.campaign_id());
    put("countryCode", record.country_code());
    put("creativeId", record.creative_id());
    put("currency", record.currency());
    put("demandSource", record.demand_source());
    put("impressionId", record.impression_id());
    put("netPayout", record.net_payout());
    put("networkInstanceId", record.network_instance_id());
    put("renderingSDK", record.rendering_sdk());
    put("renderingSDKVersion", record.rendering_sdk_version());
    put("variantId", record.variant_id());
    data.insert("impressionDepth".into(), json!(record.impression_depth()));
    data.insert("priceAccuracy".into(), json!(record.price_accuracy().ordinal()));
    data.insert("placementType".into(), json!(record.placement_type().ordinal()));
    Value::Object(data)
}
