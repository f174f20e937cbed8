//! Shared types for the KEIBA planner.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that scoring, ranking, betting
//! and session modules can depend on them without circular references.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Competitor
// ---------------------------------------------------------------------------

/// A runner in a race, as supplied by the roster source.
///
/// The competitor number is the identity: unique within a race and the
/// final tie-breaker in every ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub number: u32,
    pub name: String,
    /// Win odds (decimal, e.g. 3.2)
    pub odds: Decimal,
    /// Declared popularity (1 = favourite)
    pub popularity: u32,
    /// Externally computed base score
    pub base_score: Decimal,
    /// Attributes the planner carries through but never interprets.
    #[serde(default)]
    pub profile: CompetitorProfile,
}

impl fmt::Display for Competitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (odds {} | pop {} | base {})",
            self.number, self.name, self.odds, self.popularity, self.base_score,
        )
    }
}

/// Descriptive racing attributes. Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorProfile {
    pub frame: Option<u32>,
    pub sex_age: Option<String>,
    /// Carried weight in kg
    pub carried_weight: Option<Decimal>,
    /// Body weight at the previous start in kg
    pub last_body_weight: Option<u32>,
    pub distance: Option<u32>,
    pub running_style: Option<String>,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
    pub owner: Option<String>,
    pub breeder: Option<String>,
    pub pedigree: Option<String>,
    /// Recent form line, e.g. "1-2-1-2"
    pub recent_form: Option<String>,
    pub track_condition: Option<String>,
}

// ---------------------------------------------------------------------------
// Overlay & Mark
// ---------------------------------------------------------------------------

/// Bounded user adjustment layered on top of a base score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Overlay(i8);

impl Overlay {
    /// Inclusive symmetric bound on the adjustment.
    pub const LIMIT: i64 = 3;

    pub const ZERO: Overlay = Overlay(0);

    /// Build an overlay, rejecting deltas outside `-LIMIT..=LIMIT`.
    pub fn new(delta: i64) -> Result<Self, KeibaError> {
        if !(-Self::LIMIT..=Self::LIMIT).contains(&delta) {
            return Err(KeibaError::Range {
                field: "overlay",
                value: delta,
                bound: format!("{}..={}", -Self::LIMIT, Self::LIMIT),
            });
        }
        Ok(Overlay(delta as i8))
    }

    pub fn value(&self) -> i64 {
        i64::from(self.0)
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl TryFrom<i64> for Overlay {
    type Error = KeibaError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Overlay::new(value)
    }
}

impl From<Overlay> for i64 {
    fn from(o: Overlay) -> Self {
        o.value()
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// Informational classification of a runner. Never affects scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mark {
    #[default]
    Unset,
    /// ◎ first choice
    Honmei,
    /// ○ main rival
    Taikou,
    /// ▲ dark horse
    Tanana,
    /// △ place contender
    Renka,
    /// ⭐︎ longshot of interest (text-style star)
    Hoshi,
    /// × ruled out
    Keshi,
}

impl Mark {
    /// The closed set, in selector order.
    pub const ALL: &'static [Mark] = &[
        Mark::Unset,
        Mark::Honmei,
        Mark::Taikou,
        Mark::Tanana,
        Mark::Renka,
        Mark::Hoshi,
        Mark::Keshi,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Mark::Unset => "",
            Mark::Honmei => "◎",
            Mark::Taikou => "○",
            Mark::Tanana => "▲",
            Mark::Renka => "△",
            Mark::Hoshi => "⭐\u{fe0e}",
            Mark::Keshi => "×",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parse a mark from its symbol or romanised name (case-insensitive).
impl std::str::FromStr for Mark {
    type Err = KeibaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "-" | "unset" | "none" => Ok(Mark::Unset),
            "◎" | "honmei" => Ok(Mark::Honmei),
            "○" | "taikou" => Ok(Mark::Taikou),
            "▲" | "tanana" => Ok(Mark::Tanana),
            "△" | "renka" => Ok(Mark::Renka),
            "☆" | "★" | "⭐" | "⭐\u{fe0e}" | "hoshi" => Ok(Mark::Hoshi),
            "×" | "x" | "keshi" => Ok(Mark::Keshi),
            _ => Err(KeibaError::InvalidValue {
                field: "mark",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Mark {
    type Error = KeibaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mark> for String {
    fn from(m: Mark) -> Self {
        m.symbol().to_string()
    }
}

// ---------------------------------------------------------------------------
// Bet types
// ---------------------------------------------------------------------------

/// Wager category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Win,
    Place,
    Quinella,
    Exacta,
    Wide,
    Trio,
    Trifecta,
}

/// How many runners a combination holds and whether their order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BetShape {
    pub arity: usize,
    pub ordered: bool,
}

impl BetType {
    pub const ALL: &'static [BetType] = &[
        BetType::Win,
        BetType::Place,
        BetType::Quinella,
        BetType::Exacta,
        BetType::Wide,
        BetType::Trio,
        BetType::Trifecta,
    ];

    /// Declarative shape table. Every combination routine reads from here.
    pub const fn shape(&self) -> BetShape {
        let (arity, ordered) = match self {
            BetType::Win => (1, false),
            BetType::Place => (1, false),
            BetType::Quinella => (2, false),
            BetType::Exacta => (2, true),
            BetType::Wide => (2, false),
            BetType::Trio => (3, false),
            BetType::Trifecta => (3, true),
        };
        BetShape { arity, ordered }
    }

    pub const fn arity(&self) -> usize {
        self.shape().arity
    }

    pub const fn is_ordered(&self) -> bool {
        self.shape().ordered
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Win => write!(f, "Win"),
            BetType::Place => write!(f, "Place"),
            BetType::Quinella => write!(f, "Quinella"),
            BetType::Exacta => write!(f, "Exacta"),
            BetType::Wide => write!(f, "Wide"),
            BetType::Trio => write!(f, "Trio"),
            BetType::Trifecta => write!(f, "Trifecta"),
        }
    }
}

/// Parse a bet type from its English or Japanese name (case-insensitive).
impl std::str::FromStr for BetType {
    type Err = KeibaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" | "単勝" => Ok(BetType::Win),
            "place" | "show" | "複勝" => Ok(BetType::Place),
            "quinella" | "馬連" => Ok(BetType::Quinella),
            "exacta" | "馬単" => Ok(BetType::Exacta),
            "wide" | "quinella-place" | "ワイド" => Ok(BetType::Wide),
            "trio" | "3連複" | "三連複" => Ok(BetType::Trio),
            "trifecta" | "3連単" | "三連単" => Ok(BetType::Trifecta),
            _ => Err(KeibaError::InvalidValue {
                field: "bet_type",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

/// One wagering combination.
///
/// Unordered bet types keep their runners in ascending number order so that
/// permutations of the same set compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    bet_type: BetType,
    runners: Vec<u32>,
}

impl Combination {
    /// Build a validated combination from user input.
    pub fn new(bet_type: BetType, runners: Vec<u32>) -> Result<Self, KeibaError> {
        let arity = bet_type.arity();
        if runners.len() != arity {
            return Err(KeibaError::InvalidValue {
                field: "combination",
                value: format!("{bet_type} needs {arity} runners, got {}", runners.len()),
            });
        }
        for (i, r) in runners.iter().enumerate() {
            if runners[..i].contains(r) {
                return Err(KeibaError::InvalidValue {
                    field: "combination",
                    value: format!("runner {r} repeated"),
                });
            }
        }
        Ok(Self::from_distinct(bet_type, runners))
    }

    /// Caller guarantees the arity matches and runners are distinct.
    pub(crate) fn from_distinct(bet_type: BetType, mut runners: Vec<u32>) -> Self {
        if !bet_type.is_ordered() {
            runners.sort_unstable();
        }
        Self { bet_type, runners }
    }

    pub fn bet_type(&self) -> BetType {
        self.bet_type
    }

    pub fn runners(&self) -> &[u32] {
        &self.runners
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.bet_type.is_ordered() { ">" } else { "-" };
        let parts: Vec<String> = self.runners.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(sep))
    }
}

// ---------------------------------------------------------------------------
// Race metadata
// ---------------------------------------------------------------------------

/// JRA racecourses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Racecourse {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
}

impl fmt::Display for Racecourse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Racecourse::Sapporo => "Sapporo",
            Racecourse::Hakodate => "Hakodate",
            Racecourse::Fukushima => "Fukushima",
            Racecourse::Niigata => "Niigata",
            Racecourse::Tokyo => "Tokyo",
            Racecourse::Nakayama => "Nakayama",
            Racecourse::Chukyo => "Chukyo",
            Racecourse::Kyoto => "Kyoto",
            Racecourse::Hanshin => "Hanshin",
            Racecourse::Kokura => "Kokura",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Racecourse {
    type Err = KeibaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sapporo" | "札幌" => Ok(Racecourse::Sapporo),
            "hakodate" | "函館" => Ok(Racecourse::Hakodate),
            "fukushima" | "福島" => Ok(Racecourse::Fukushima),
            "niigata" | "新潟" => Ok(Racecourse::Niigata),
            "tokyo" | "東京" => Ok(Racecourse::Tokyo),
            "nakayama" | "中山" => Ok(Racecourse::Nakayama),
            "chukyo" | "中京" => Ok(Racecourse::Chukyo),
            "kyoto" | "京都" => Ok(Racecourse::Kyoto),
            "hanshin" | "阪神" => Ok(Racecourse::Hanshin),
            "kokura" | "小倉" => Ok(Racecourse::Kokura),
            _ => Err(KeibaError::InvalidValue {
                field: "racecourse",
                value: s.to_string(),
            }),
        }
    }
}

/// Race grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    G1,
    G2,
    G3,
    #[serde(rename = "OP")]
    Open,
    Conditions,
}

/// Which race a session is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceMeta {
    pub date: NaiveDate,
    pub course: Racecourse,
    /// Race number on the card, 1–12
    pub number: u8,
    /// External race id (e.g. a netkeiba id), if known
    #[serde(default)]
    pub race_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grade: Option<Grade>,
    /// Post time as shown on the card, e.g. "15:40"
    #[serde(default)]
    pub post_time: Option<String>,
}

impl fmt::Display for RaceMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}R", self.date, self.course, self.number)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(grade) = &self.grade {
            write!(f, " ({grade:?})")?;
        }
        Ok(())
    }
}

impl RaceMeta {
    pub const MAX_RACE_NUMBER: u8 = 12;

    pub fn new(date: NaiveDate, course: Racecourse, number: u8) -> Result<Self, KeibaError> {
        let meta = RaceMeta {
            date,
            course,
            number,
            race_id: None,
            name: None,
            grade: None,
            post_time: None,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Reject race numbers outside the card.
    pub fn validate(&self) -> Result<(), KeibaError> {
        if self.number == 0 || self.number > Self::MAX_RACE_NUMBER {
            return Err(KeibaError::Range {
                field: "race_number",
                value: i64::from(self.number),
                bound: format!("1..={}", Self::MAX_RACE_NUMBER),
            });
        }
        Ok(())
    }

    /// A stable label for logs and listings.
    pub fn label(&self) -> String {
        format!("{}-{}-{:02}", self.date.format("%Y%m%d"), self.course, self.number)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for KEIBA.
///
/// Every variant aborts the operation that raised it with state unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeibaError {
    #[error("{field} out of range: {value} (allowed {bound})")]
    Range {
        field: &'static str,
        value: i64,
        bound: String,
    },

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Insufficient pool for {bet_type}: need {required} runners, have {available}")]
    InsufficientPool {
        bet_type: BetType,
        required: usize,
        available: usize,
    },

    #[error("Competitor not found: #{0}")]
    CompetitorNotFound(u32),

    #[error("Combination not in current allocation: {0}")]
    CombinationNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("No bet configured for this session")]
    NoActiveBet,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
