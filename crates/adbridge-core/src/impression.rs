//! Impression records
//!
//! An [`ImpressionRecord`] describes one monetized ad impression. It is
//! built once by the codec from a native payload and never mutated; the
//! [`Event`](crate::codec::Event) that carries it owns it and hands it to the
//! listener by value.
//!
//! The one rule enforced at construction: `price_accuracy` is
//! [`PriceAccuracy::Undisclosed`] exactly when the payout is absent or zero.

use serde::Serialize;
use tracing::warn;

/// Accuracy of the net payout value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAccuracy {
    /// No payout is disclosed (absent or zero)
    #[default]
    Undisclosed,
    /// Estimate based on historical reporting of a mediated network
    Predicted,
    /// Exact, committed value from a programmatic buyer
    Programmatic,
}

impl PriceAccuracy {
    /// Wire ordinal
    pub fn ordinal(self) -> i64 {
        match self {
            PriceAccuracy::Undisclosed => 0,
            PriceAccuracy::Predicted => 1,
            PriceAccuracy::Programmatic => 2,
        }
    }

    /// Parse a wire ordinal
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(PriceAccuracy::Undisclosed),
            1 => Some(PriceAccuracy::Predicted),
            2 => Some(PriceAccuracy::Programmatic),
            _ => None,
        }
    }

    /// Parse a lowercase or capitalized name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "undisclosed" => Some(PriceAccuracy::Undisclosed),
            "predicted" => Some(PriceAccuracy::Predicted),
            "programmatic" => Some(PriceAccuracy::Programmatic),
            _ => None,
        }
    }
}

/// Type of the placement an impression was served on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementType {
    #[default]
    Banner,
    Interstitial,
    Rewarded,
}

impl PlacementType {
    /// Wire ordinal
    pub fn ordinal(self) -> i64 {
        match self {
            PlacementType::Banner => 0,
            PlacementType::Interstitial => 1,
            PlacementType::Rewarded => 2,
        }
    }

    /// Parse a wire ordinal
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(PlacementType::Banner),
            1 => Some(PlacementType::Interstitial),
            2 => Some(PlacementType::Rewarded),
            _ => None,
        }
    }

    /// Parse a lowercase or capitalized name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "banner" => Some(PlacementType::Banner),
            "interstitial" => Some(PlacementType::Interstitial),
            "rewarded" => Some(PlacementType::Rewarded),
            _ => None,
        }
    }
}

/// One monetized ad impression
///
/// Fields are read-only; build one with [`ImpressionRecord::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpressionRecord {
    advertiser_domain: Option<String>,
    campaign_id: Option<String>,
    country_code: Option<String>,
    creative_id: Option<String>,
    currency: Option<String>,
    demand_source: Option<String>,
    impression_depth: u32,
    impression_id: Option<String>,
    net_payout: Option<String>,
    network_instance_id: Option<String>,
    #[serde(rename = "renderingSDK")]
    rendering_sdk: Option<String>,
    #[serde(rename = "renderingSDKVersion")]
    rendering_sdk_version: Option<String>,
    price_accuracy: PriceAccuracy,
    placement_type: PlacementType,
    variant_id: Option<String>,
}

impl ImpressionRecord {
    /// Start building a record for a placement type
    pub fn builder(placement_type: PlacementType) -> ImpressionBuilder {
        ImpressionBuilder {
            record: ImpressionRecord {
                advertiser_domain: None,
                campaign_id: None,
                country_code: None,
                creative_id: None,
                currency: None,
                demand_source: None,
                impression_depth: 0,
                impression_id: None,
                net_payout: None,
                network_instance_id: None,
                rendering_sdk: None,
                rendering_sdk_version: None,
                price_accuracy: PriceAccuracy::Undisclosed,
                placement_type,
                variant_id: None,
            },
        }
    }

    /// Advertiser domain, when disclosed
    pub fn advertiser_domain(&self) -> Option<&str> {
        self.advertiser_domain.as_deref()
    }

    /// Campaign id, when disclosed
    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id.as_deref()
    }

    /// ISO country code of the impression
    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    /// Creative id, when disclosed
    pub fn creative_id(&self) -> Option<&str> {
        self.creative_id.as_deref()
    }

    /// Payout currency
    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    /// Name of the buyer that won the impression
    pub fn demand_source(&self) -> Option<&str> {
        self.demand_source.as_deref()
    }

    /// Impressions so far this session for this placement type
    pub fn impression_depth(&self) -> u32 {
        self.impression_depth
    }

    /// Unique impression id
    pub fn impression_id(&self) -> Option<&str> {
        self.impression_id.as_deref()
    }

    /// Net payout as a decimal string; `None` means undisclosed
    pub fn net_payout(&self) -> Option<&str> {
        self.net_payout.as_deref()
    }

    /// Mediated network's own placement id
    pub fn network_instance_id(&self) -> Option<&str> {
        self.network_instance_id.as_deref()
    }

    /// Name of the SDK that rendered the ad
    pub fn rendering_sdk(&self) -> Option<&str> {
        self.rendering_sdk.as_deref()
    }

    /// Version of the SDK that rendered the ad
    pub fn rendering_sdk_version(&self) -> Option<&str> {
        self.rendering_sdk_version.as_deref()
    }

    /// Accuracy of [`net_payout`](Self::net_payout)
    pub fn price_accuracy(&self) -> PriceAccuracy {
        self.price_accuracy
    }

    /// Placement type the impression was served on
    pub fn placement_type(&self) -> PlacementType {
        self.placement_type
    }

    /// Multi-testing variant id
    pub fn variant_id(&self) -> Option<&str> {
        self.variant_id.as_deref()
    }
}

/// Builder for [`ImpressionRecord`]
#[derive(Debug, Clone)]
pub struct ImpressionBuilder {
    record: ImpressionRecord,
}

impl ImpressionBuilder {
    pub fn advertiser_domain(mut self, value: Option<String>) -> Self {
        self.record.advertiser_domain = value;
        self
    }

    pub fn campaign_id(mut self, value: Option<String>) -> Self {
        self.record.campaign_id = value;
        self
    }

    pub fn country_code(mut self, value: Option<String>) -> Self {
        self.record.country_code = value;
        self
    }

    pub fn creative_id(mut self, value: Option<String>) -> Self {
        self.record.creative_id = value;
        self
    }

    pub fn currency(mut self, value: Option<String>) -> Self {
        self.record.currency = value;
        self
    }

    pub fn demand_source(mut self, value: Option<String>) -> Self {
        self.record.demand_source = value;
        self
    }

    pub fn impression_depth(mut self, value: u32) -> Self {
        self.record.impression_depth = value;
        self
    }

    pub fn impression_id(mut self, value: Option<String>) -> Self {
        self.record.impression_id = value;
        self
    }

    pub fn net_payout(mut self, value: Option<String>) -> Self {
        self.record.net_payout = value;
        self
    }

    pub fn network_instance_id(mut self, value: Option<String>) -> Self {
        self.record.network_instance_id = value;
        self
    }

    pub fn rendering_sdk(mut self, value: Option<String>) -> Self {
        self.record.rendering_sdk = value;
        self
    }

    pub fn rendering_sdk_version(mut self, value: Option<String>) -> Self {
        self.record.rendering_sdk_version = value;
        self
    }

    /// Declared accuracy; reconciled against the payout in [`build`](Self::build)
    pub fn price_accuracy(mut self, value: PriceAccuracy) -> Self {
        self.record.price_accuracy = value;
        self
    }

    pub fn variant_id(mut self, value: Option<String>) -> Self {
        self.record.variant_id = value;
        self
    }

    /// Finish the record, enforcing the payout/accuracy rule
    ///
    /// - absent, zero or unparseable payout: accuracy becomes `Undisclosed`
    ///   (an unparseable payout is dropped)
    /// - non-zero payout declared `Undisclosed`: accuracy becomes `Predicted`
    pub fn build(mut self) -> ImpressionRecord {
        let payout = match self.record.net_payout.take() {
            Some(raw) => match parse_payout(&raw) {
                Some(value) => Some((raw, value)),
                None => {
                    warn!(payout = %raw, "unparseable net payout, treating as undisclosed");
                    None
                }
            },
            None => None,
        };

        match payout {
            Some((raw, value)) if value != 0.0 => {
                self.record.net_payout = Some(raw);
                if self.record.price_accuracy == PriceAccuracy::Undisclosed {
                    self.record.price_accuracy = PriceAccuracy::Predicted;
                }
            }
            Some((raw, _zero)) => {
                self.record.net_payout = Some(raw);
                self.record.price_accuracy = PriceAccuracy::Undisclosed;
            }
            None => {
                self.record.price_accuracy = PriceAccuracy::Undisclosed;
            }
        }

        self.record
    }
}

fn parse_payout(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}
