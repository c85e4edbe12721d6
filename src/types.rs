// =============================================================================
// Shared tagged-variant types used across the supervisor
// =============================================================================

use serde::{Deserialize, Serialize};

/// Phase of the funded-trader program. Changes the profit target and the
/// news-blackout policy (`RuleSpec::news_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStage {
    Challenge,
    Verification,
    Funded,
}

impl std::fmt::Display for AccountStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Challenge => write!(f, "challenge"),
            Self::Verification => write!(f, "verification"),
            Self::Funded => write!(f, "funded"),
        }
    }
}

/// Sub-mode of a funded account. `Standard` funded accounts enforce a news
/// blackout; `Swing` accounts do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundedMode {
    Standard,
    Swing,
}

impl std::fmt::Display for FundedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Swing => write!(f, "swing"),
        }
    }
}

/// Defensive behavior applied during the configurable window before local
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MidnightPolicy {
    None,
    Buffer,
    Reduce,
    Flatten,
}

impl std::fmt::Display for MidnightPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Buffer => write!(f, "buffer"),
            Self::Reduce => write!(f, "reduce"),
            Self::Flatten => write!(f, "flatten"),
        }
    }
}

/// How open positions are marked to market when simulating signal streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MtMMode {
    WorstOhlc,
    Mid,
}

impl std::fmt::Display for MtMMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorstOhlc => write!(f, "worst_ohlc"),
            Self::Mid => write!(f, "mid"),
        }
    }
}

/// Order / position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Broker-reported order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerOrderStatus {
    Submitted,
    Open,
    Partial,
    Filled,
    Rejected,
    Canceled,
}

impl std::fmt::Display for BrokerOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Open => write!(f, "open"),
            Self::Partial => write!(f, "partial"),
            Self::Filled => write!(f, "filled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Journal lifecycle status. Strictly a superset of `BrokerOrderStatus`: it
/// adds the pre-submission `Intent` state and the terminal `Closed` state
/// reconciliation moves an order into once it is no longer open anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Intent,
    Submitted,
    Open,
    Partial,
    Filled,
    Canceled,
    Rejected,
    Closed,
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intent => write!(f, "intent"),
            Self::Submitted => write!(f, "submitted"),
            Self::Open => write!(f, "open"),
            Self::Partial => write!(f, "partial"),
            Self::Filled => write!(f, "filled"),
            Self::Canceled => write!(f, "canceled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl From<BrokerOrderStatus> for JournalStatus {
    fn from(status: BrokerOrderStatus) -> Self {
        match status {
            BrokerOrderStatus::Submitted => Self::Submitted,
            BrokerOrderStatus::Open => Self::Open,
            BrokerOrderStatus::Partial => Self::Partial,
            BrokerOrderStatus::Filled => Self::Filled,
            BrokerOrderStatus::Rejected => Self::Rejected,
            BrokerOrderStatus::Canceled => Self::Canceled,
        }
    }
}

/// Throttle request kind; `Modify` and `Cancel` additionally count against
/// the per-minute modification cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Place,
    Modify,
    Cancel,
}
