//! # Compact Bill Codec
//!
//! Packs a whole shared bill into a single URL path segment and back.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Compact Token Pipeline                             │
//! │                                                                         │
//! │  encode:  SharedTabData                                                 │
//! │             │  index items / rabbits by position                        │
//! │             ▼                                                           │
//! │           CompactBill  {"v":1,"n":..,"i":[[desc,price]],"a":[[0,1]]}    │
//! │             │  serde_json                                               │
//! │             ▼                                                           │
//! │           raw DEFLATE (flate2)                                          │
//! │             │                                                           │
//! │             ▼                                                           │
//! │           base64 URL-safe, no padding  →  token                         │
//! │                                                                         │
//! │  decode:  the same steps in reverse, then shape checks.                 │
//! │           Any failure is a DecodeError; nothing is half-built.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoded entities carry synthetic ids (`item-<i>`, `rabbit-<i>`) on a tab
//! with id [`SHARED_TAB_ID`]. Only positional identity survives the trip.

use std::collections::HashMap;
use std::io::{Read, Write};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::currency::DEFAULT_CURRENCY;
use crate::error::{DecodeError, EncodeError};
use crate::types::{
    Assignment, Item, Profile, Rabbit, RabbitColor, SharedTabData, Tab, PALETTE_VERSION,
};

/// Tokens longer than this are decoded locally; shorter ones are keys into
/// the share store.
pub const COMPACT_TOKEN_THRESHOLD: usize = 20;

/// Tab id given to every decoded compact bill.
pub const SHARED_TAB_ID: &str = "shared";

/// Upper bound on the inflated payload.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

/// URL-safe alphabet, no padding on encode, padding tolerated on decode.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// Token Classification
// =============================================================================

/// What a share token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareToken<'a> {
    /// Self-contained bill, decode with [`decode_bill`].
    Compact(&'a str),
    /// Random key into the share store.
    Remote(&'a str),
}

/// Classifies a token purely by length.
pub fn classify_token(token: &str) -> ShareToken<'_> {
    if token.len() > COMPACT_TOKEN_THRESHOLD {
        ShareToken::Compact(token)
    } else {
        ShareToken::Remote(token)
    }
}

// =============================================================================
// Wire Shape
// =============================================================================

fn default_palette_version() -> u8 {
    PALETTE_VERSION
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompactBill {
    #[serde(default = "default_palette_version")]
    v: u8,
    n: String,
    x: f64,
    p: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<String>,
    i: Vec<CompactItem>,
    r: Vec<CompactRabbit>,
    a: Vec<CompactAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    o: Option<CompactProfile>,
}

/// `[description, price_cents]`
#[derive(Debug, Serialize, Deserialize)]
struct CompactItem(String, i64);

/// `[name, palette_index]`
#[derive(Debug, Serialize, Deserialize)]
struct CompactRabbit(String, u8);

/// `[item_index, rabbit_index]`
#[derive(Debug, Serialize, Deserialize)]
struct CompactAssignment(usize, usize);

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompactProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    u: Option<String>,
}

impl CompactBill {
    fn from_shared(data: &SharedTabData) -> Self {
        let item_index: HashMap<&str, usize> = data
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.as_str(), i))
            .collect();
        let rabbit_index: HashMap<&str, usize> = data
            .rabbits
            .iter()
            .enumerate()
            .map(|(i, rabbit)| (rabbit.id.as_str(), i))
            .collect();

        // Edges pointing outside the bill are dropped, not reported.
        let a = data
            .assignments
            .iter()
            .filter_map(|edge| {
                let item = item_index.get(edge.item_id.as_str())?;
                let rabbit = rabbit_index.get(edge.rabbit_id.as_str())?;
                Some(CompactAssignment(*item, *rabbit))
            })
            .collect();

        CompactBill {
            v: PALETTE_VERSION,
            n: data.tab.name.clone(),
            x: data.tab.tax_percent,
            p: data.tab.tip_percent,
            c: Some(data.tab.currency_code.clone()),
            i: data
                .items
                .iter()
                .map(|item| CompactItem(item.description.clone(), item.price_cents))
                .collect(),
            r: data
                .rabbits
                .iter()
                .map(|rabbit| CompactRabbit(rabbit.name.clone(), rabbit.color.palette_index()))
                .collect(),
            a,
            o: data.owner_profile.as_ref().map(|profile| CompactProfile {
                d: profile.display_name.clone(),
                v: profile.venmo_username.clone(),
                c: profile.cashapp_cashtag.clone(),
                p: profile.paypal_username.clone(),
                u: Some(profile.currency_code.clone()),
            }),
        }
    }

    /// Checks everything serde cannot express.
    fn check_shape(&self) -> Result<(), DecodeError> {
        if self.v != PALETTE_VERSION {
            return Err(DecodeError::Shape(format!(
                "unknown palette version {}",
                self.v
            )));
        }
        if !self.x.is_finite() || !self.p.is_finite() {
            return Err(DecodeError::Shape("tax or tip is not finite".to_string()));
        }
        if let Some(CompactItem(_, price)) = self.i.iter().find(|item| item.1 < 0) {
            return Err(DecodeError::Shape(format!("negative price {price}")));
        }
        if let Some(CompactRabbit(_, idx)) = self
            .r
            .iter()
            .find(|rabbit| RabbitColor::from_palette_index(rabbit.1).is_none())
        {
            return Err(DecodeError::Shape(format!("unknown palette index {idx}")));
        }
        if let Some(CompactAssignment(item, rabbit)) = self
            .a
            .iter()
            .find(|edge| edge.0 >= self.i.len() || edge.1 >= self.r.len())
        {
            return Err(DecodeError::Shape(format!(
                "assignment [{item}, {rabbit}] is out of range"
            )));
        }
        Ok(())
    }

    fn into_shared(self) -> SharedTabData {
        let epoch: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;
        let currency_code = self
            .c
            .clone()
            .or_else(|| self.o.as_ref().and_then(|o| o.u.clone()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let tab = Tab {
            id: SHARED_TAB_ID.to_string(),
            name: self.n,
            tax_percent: self.x,
            tip_percent: self.p,
            currency_code: currency_code.clone(),
            created_at: epoch,
            updated_at: epoch,
        };

        let items = self
            .i
            .into_iter()
            .enumerate()
            .map(|(i, CompactItem(description, price_cents))| Item {
                id: item_id(i),
                tab_id: SHARED_TAB_ID.to_string(),
                description,
                price_cents,
            })
            .collect();

        let rabbits = self
            .r
            .into_iter()
            .enumerate()
            .map(|(i, CompactRabbit(name, idx))| Rabbit {
                id: rabbit_id(i),
                tab_id: SHARED_TAB_ID.to_string(),
                name,
                color: RabbitColor::from_palette_index(idx).unwrap_or_default(),
                profile_id: None,
            })
            .collect();

        let assignments = self
            .a
            .into_iter()
            .map(|CompactAssignment(item, rabbit)| Assignment::new(item_id(item), rabbit_id(rabbit)))
            .collect();

        let owner_profile = self.o.map(|o| Profile {
            display_name: o.d,
            venmo_username: o.v,
            cashapp_cashtag: o.c,
            paypal_username: o.p,
            currency_code: o.u.unwrap_or_else(|| currency_code.clone()),
        });

        SharedTabData {
            tab,
            items,
            rabbits,
            assignments,
            owner_profile,
        }
    }
}

fn item_id(index: usize) -> String {
    format!("item-{index}")
}

fn rabbit_id(index: usize) -> String {
    format!("rabbit-{index}")
}

// =============================================================================
// Public API
// =============================================================================

/// Encodes a bill into a compact, URL-safe token.
///
/// ## Example
/// ```rust
/// use rabbit_core::codec::{classify_token, decode_bill, encode_bill, ShareToken};
/// use rabbit_core::types::{SharedTabData, Tab};
///
/// let bill = SharedTabData {
///     tab: Tab::new("Lunch", "USD"),
///     items: vec![],
///     rabbits: vec![],
///     assignments: vec![],
///     owner_profile: None,
/// };
/// let token = encode_bill(&bill).unwrap();
/// assert!(matches!(classify_token(&token), ShareToken::Compact(_)));
/// assert_eq!(decode_bill(&token).unwrap().tab.name, "Lunch");
/// ```
pub fn encode_bill(data: &SharedTabData) -> Result<String, EncodeError> {
    let json = serde_json::to_vec(&CompactBill::from_shared(data))?;
    pack(&json)
}

/// Decodes a compact token. Fails closed: any problem yields a [`DecodeError`].
pub fn decode_bill(token: &str) -> Result<SharedTabData, DecodeError> {
    let json = unpack(token.trim())?;
    let compact: CompactBill = serde_json::from_slice(&json)?;
    compact.check_shape()?;
    Ok(compact.into_shared())
}

fn pack(json: &[u8]) -> Result<String, EncodeError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(json)?;
    let compressed = encoder.finish()?;
    Ok(TOKEN_ENGINE.encode(compressed))
}

fn unpack(token: &str) -> Result<Vec<u8>, DecodeError> {
    let compressed = TOKEN_ENGINE.decode(token)?;

    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_PAYLOAD_BYTES as u64 + 1)
        .read_to_end(&mut json)
        .map_err(|e| DecodeError::Compression(e.to_string()))?;

    if json.len() > MAX_PAYLOAD_BYTES {
        return Err(DecodeError::Compression(format!(
            "payload exceeds {MAX_PAYLOAD_BYTES} bytes"
        )));
    }
    Ok(json)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PALETTE_V1;
    use proptest::prelude::*;

    fn dinner() -> SharedTabData {
        let mut tab = Tab::new("Friday dinner", "EUR");
        tab.tax_percent = 8.0;
        tab.tip_percent = 20.0;

        let burger = Item::new(&tab.id, "Burger", 1000);
        let fries = Item::new(&tab.id, "Fries", 400);
        let a = Rabbit::new(&tab.id, "A", RabbitColor::Green);
        let b = Rabbit::new(&tab.id, "B", RabbitColor::Purple);

        SharedTabData {
            assignments: vec![
                Assignment::new(&burger.id, &a.id),
                Assignment::new(&fries.id, &a.id),
                Assignment::new(&fries.id, &b.id),
            ],
            items: vec![burger, fries],
            rabbits: vec![a, b],
            owner_profile: Some(Profile {
                display_name: Some("Sam".into()),
                venmo_username: Some("sam-v".into()),
                cashapp_cashtag: None,
                paypal_username: Some("sampp".into()),
                currency_code: "EUR".into(),
            }),
            tab,
        }
    }

    fn token_for_json(json: &str) -> String {
        pack(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_bill() {
        let bill = dinner();
        let decoded = decode_bill(&encode_bill(&bill).unwrap()).unwrap();

        assert_eq!(decoded.tab.id, SHARED_TAB_ID);
        assert_eq!(decoded.tab.name, "Friday dinner");
        assert_eq!(decoded.tab.tax_percent, 8.0);
        assert_eq!(decoded.tab.tip_percent, 20.0);
        assert_eq!(decoded.tab.currency_code, "EUR");
        assert_eq!(decoded.tab.created_at, DateTime::<Utc>::UNIX_EPOCH);

        let items: Vec<_> = decoded
            .items
            .iter()
            .map(|i| (i.id.as_str(), i.description.as_str(), i.price_cents))
            .collect();
        assert_eq!(
            items,
            vec![("item-0", "Burger", 1000), ("item-1", "Fries", 400)]
        );

        let rabbits: Vec<_> = decoded
            .rabbits
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str(), r.color))
            .collect();
        assert_eq!(
            rabbits,
            vec![
                ("rabbit-0", "A", RabbitColor::Green),
                ("rabbit-1", "B", RabbitColor::Purple)
            ]
        );

        assert_eq!(
            decoded.assignments,
            vec![
                Assignment::new("item-0", "rabbit-0"),
                Assignment::new("item-1", "rabbit-0"),
                Assignment::new("item-1", "rabbit-1"),
            ]
        );

        let owner = decoded.owner_profile.unwrap();
        assert_eq!(owner.display_name.as_deref(), Some("Sam"));
        assert_eq!(owner.venmo_username.as_deref(), Some("sam-v"));
        assert_eq!(owner.cashapp_cashtag, None);
        assert_eq!(owner.paypal_username.as_deref(), Some("sampp"));
    }

    #[test]
    fn test_dangling_assignments_are_dropped() {
        let mut bill = dinner();
        bill.assignments.push(Assignment::new("ghost", &bill.rabbits[0].id));
        bill.assignments.push(Assignment::new(&bill.items[0].id, "ghost"));

        let decoded = decode_bill(&encode_bill(&bill).unwrap()).unwrap();
        assert_eq!(decoded.assignments.len(), 3);
    }

    #[test]
    fn test_tiny_bill_is_classified_compact() {
        let bill = SharedTabData {
            tab: Tab::new("x", "USD"),
            items: vec![],
            rabbits: vec![],
            assignments: vec![],
            owner_profile: None,
        };
        let token = encode_bill(&bill).unwrap();
        assert!(token.len() > COMPACT_TOKEN_THRESHOLD);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_classify_token() {
        assert_eq!(classify_token("aB3-_x9Q"), ShareToken::Remote("aB3-_x9Q"));
        let twenty = "a".repeat(20);
        assert_eq!(classify_token(&twenty), ShareToken::Remote(twenty.as_str()));
        let long = "a".repeat(21);
        assert_eq!(classify_token(&long), ShareToken::Compact(long.as_str()));
    }

    #[test]
    fn test_garbage_token_fails() {
        assert!(decode_bill("not-a-valid-token").is_err());
        assert!(decode_bill("!!!!").is_err());
        assert!(decode_bill("").is_err());
    }

    #[test]
    fn test_non_json_payload_fails() {
        let token = token_for_json("this is not json");
        assert!(matches!(decode_bill(&token), Err(DecodeError::Payload(_))));
    }

    #[test]
    fn test_wrong_tuple_shape_fails() {
        let token = token_for_json(r#"{"n":"x","x":0,"p":0,"i":[["a",1,2]],"r":[],"a":[]}"#);
        assert!(matches!(decode_bill(&token), Err(DecodeError::Payload(_))));

        let token = token_for_json(r#"{"n":"x","x":0,"p":0,"i":[[100,"a"]],"r":[],"a":[]}"#);
        assert!(decode_bill(&token).is_err());
    }

    #[test]
    fn test_unknown_field_fails() {
        let token =
            token_for_json(r#"{"n":"x","x":0,"p":0,"i":[],"r":[],"a":[],"z":true}"#);
        assert!(decode_bill(&token).is_err());
    }

    #[test]
    fn test_out_of_range_references_fail() {
        let token = token_for_json(r#"{"n":"x","x":0,"p":0,"i":[["a",1]],"r":[["A",0]],"a":[[0,1]]}"#);
        assert!(matches!(decode_bill(&token), Err(DecodeError::Shape(_))));

        let token = token_for_json(r#"{"n":"x","x":0,"p":0,"i":[],"r":[["A",6]],"a":[]}"#);
        assert!(matches!(decode_bill(&token), Err(DecodeError::Shape(_))));

        let token = token_for_json(r#"{"v":2,"n":"x","x":0,"p":0,"i":[],"r":[],"a":[]}"#);
        assert!(matches!(decode_bill(&token), Err(DecodeError::Shape(_))));

        let token = token_for_json(r#"{"n":"x","x":0,"p":0,"i":[["a",-5]],"r":[],"a":[]}"#);
        assert!(matches!(decode_bill(&token), Err(DecodeError::Shape(_))));
    }

    #[test]
    fn test_missing_version_defaults_to_current_palette() {
        let token = token_for_json(r#"{"n":"Old link","x":5,"p":0,"i":[["Tea",300]],"r":[["A",2]],"a":[[0,0]]}"#);
        let decoded = decode_bill(&token).unwrap();
        assert_eq!(decoded.rabbits[0].color, RabbitColor::Yellow);
        assert_eq!(decoded.tab.currency_code, DEFAULT_CURRENCY);
        assert!(decoded.owner_profile.is_none());
    }

    #[test]
    fn test_oversized_payload_fails() {
        let padding = " ".repeat(MAX_PAYLOAD_BYTES + 10);
        let token = token_for_json(&format!(
            r#"{{"n":"x","x":0,"p":0,"i":[],"r":[],"a":[]}}{padding}"#
        ));
        assert!(matches!(
            decode_bill(&token),
            Err(DecodeError::Compression(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            name in "[a-zA-Z0-9 ]{1,30}",
            tax_hundredths in 0u32..5000,
            tip_hundredths in 0u32..5000,
            items in prop::collection::vec(("[a-zA-Z ]{0,20}", 0i64..1_000_000), 0..8),
            rabbits in prop::collection::vec(("[a-zA-Z]{1,12}", 0usize..6), 0..6),
            edges in prop::collection::vec((0usize..8, 0usize..6), 0..20),
        ) {
            let mut tab = Tab::new(name.clone(), "USD");
            tab.tax_percent = f64::from(tax_hundredths) / 100.0;
            tab.tip_percent = f64::from(tip_hundredths) / 100.0;

            let items: Vec<Item> = items
                .into_iter()
                .map(|(d, p)| Item::new(&tab.id, d, p))
                .collect();
            let rabbits: Vec<Rabbit> = rabbits
                .into_iter()
                .map(|(n, c)| Rabbit::new(&tab.id, n, PALETTE_V1[c]))
                .collect();
            let assignments: Vec<Assignment> = edges
                .iter()
                .filter(|(i, r)| *i < items.len() && *r < rabbits.len())
                .map(|(i, r)| Assignment::new(&items[*i].id, &rabbits[*r].id))
                .collect();
            let expected_edges: Vec<Assignment> = edges
                .iter()
                .filter(|(i, r)| *i < items.len() && *r < rabbits.len())
                .map(|(i, r)| Assignment::new(item_id(*i), rabbit_id(*r)))
                .collect();

            let bill = SharedTabData { tab, items, rabbits, assignments, owner_profile: None };
            let decoded = decode_bill(&encode_bill(&bill).unwrap()).unwrap();

            prop_assert_eq!(&decoded.tab.name, &bill.tab.name);
            prop_assert_eq!(decoded.tab.tax_percent, bill.tab.tax_percent);
            prop_assert_eq!(decoded.tab.tip_percent, bill.tab.tip_percent);
            prop_assert_eq!(decoded.items.len(), bill.items.len());
            for (got, want) in decoded.items.iter().zip(&bill.items) {
                prop_assert_eq!(&got.description, &want.description);
                prop_assert_eq!(got.price_cents, want.price_cents);
            }
            prop_assert_eq!(decoded.rabbits.len(), bill.rabbits.len());
            for (got, want) in decoded.rabbits.iter().zip(&bill.rabbits) {
                prop_assert_eq!(&got.name, &want.name);
                prop_assert_eq!(got.color, want.color);
            }
            prop_assert_eq!(decoded.assignments, expected_edges);
        }
    }
}
