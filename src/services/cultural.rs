//! Contextual rule model: maps the calendar and the shopper's region to a set
//! of relevant categories and a cultural multiplier.
//!
//! The rule tables are data, held in the artifact, so a new observance year or
//! a regional preference change is a retrain rather than a code change.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::{AppResult, TrainingError};
use crate::models::{Language, Reason, Region, SignalCandidate, UserProfile};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule supplied the categories. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulturalBranch {
    Observance,
    Festival,
    YearEnd,
    Seasonal,
}

impl CulturalBranch {
    const EVENTS: [CulturalBranch; 3] = [
        CulturalBranch::Observance,
        CulturalBranch::Festival,
        CulturalBranch::YearEnd,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localized {
    pub uz: String,
    pub ru: String,
}

impl Localized {
    fn new(uz: &str, ru: &str) -> Self {
        Self {
            uz: uz.to_string(),
            ru: ru.to_string(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Uz => &self.uz,
            Language::Ru => &self.ru,
        }
    }
}

/// Inclusive date range an event is active in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventWindow {
    /// A specific range, used for observances that follow the lunar calendar
    Dated { start: NaiveDate, end: NaiveDate },
    /// The same month/day range every year. May wrap past 31 December.
    Annual { start: (u32, u32), end: (u32, u32) },
}

impl EventWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            EventWindow::Dated { start, end } => *start <= date && date <= *end,
            EventWindow::Annual { start, end } => {
                let day = (date.month(), date.day());
                if start <= end {
                    *start <= day && day <= *end
                } else {
                    day >= *start || day <= *end
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalEvent {
    pub key: String,
    pub branch: CulturalBranch,
    pub categories: Vec<String>,
    pub multiplier: f64,
    pub windows: Vec<EventWindow>,
    pub explanation: Localized,
}

impl CulturalEvent {
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.windows.iter().any(|w| w.contains(date))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRule {
    pub season: Season,
    pub categories: Vec<String>,
    pub explanation: Localized,
}

/// Categories, multiplier and explanation in effect for one request
#[derive(Debug, Clone, PartialEq)]
pub struct CulturalContext {
    pub branch: CulturalBranch,
    pub event: Option<String>,
    pub season: Season,
    /// Event or season categories first, then the region's, without repeats
    pub categories: Vec<String>,
    pub multiplier: f64,
    pub explanation: String,
}

/// Calendar and regional state reported alongside recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFactors {
    pub season: Season,
    pub is_observance_period: bool,
    pub is_festival_period: bool,
    pub user_region: String,
    pub cultural_branch: CulturalBranch,
    pub cultural_multiplier: f64,
}

/// Trained cultural artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalModel {
    events: Vec<CulturalEvent>,
    seasons: Vec<SeasonRule>,
    region_categories: BTreeMap<Region, Vec<String>>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn dated(start: (i32, u32, u32), end: (i32, u32, u32)) -> Option<EventWindow> {
    Some(EventWindow::Dated {
        start: NaiveDate::from_ymd_opt(start.0, start.1, start.2)?,
        end: NaiveDate::from_ymd_opt(end.0, end.1, end.2)?,
    })
}

impl CulturalModel {
    /// Builds the standard rule tables and validates them
    pub fn build() -> Result<Self, TrainingError> {
        let model = Self::standard();
        model.validate()?;
        Ok(model)
    }

    fn standard() -> Self {
        let ramadan = [
            ((2024, 3, 11), (2024, 4, 9)),
            ((2025, 3, 1), (2025, 3, 30)),
            ((2026, 2, 18), (2026, 3, 19)),
            ((2027, 2, 8), (2027, 3, 9)),
            ((2028, 1, 28), (2028, 2, 26)),
            ((2029, 1, 16), (2029, 2, 14)),
            ((2030, 1, 6), (2030, 2, 4)),
        ]
        .into_iter()
        .filter_map(|(start, end)| dated(start, end))
        .collect();

        let events = vec![
            CulturalEvent {
                key: "ramadan".to_string(),
                branch: CulturalBranch::Observance,
                categories: strings(&["food", "dates", "religious_items", "gifts"]),
                multiplier: 1.5,
                windows: ramadan,
                explanation: Localized::new(
                    "Ramazon muborak! Ro'za tutish uchun tavsiya etilgan mahsulotlar",
                    "Рамадан мубарак! Товары, рекомендованные для поста",
                ),
            },
            CulturalEvent {
                key: "navruz".to_string(),
                branch: CulturalBranch::Festival,
                categories: strings(&["traditional_clothes", "decorations", "sweets"]),
                multiplier: 1.8,
                windows: vec![EventWindow::Annual {
                    start: (3, 18),
                    end: (3, 24),
                }],
                explanation: Localized::new(
                    "Navruz bayrami muborak! An'anaviy bayram mahsulotlari",
                    "С праздником Навруз! Традиционные праздничные товары",
                ),
            },
            CulturalEvent {
                key: "new_year".to_string(),
                branch: CulturalBranch::YearEnd,
                categories: strings(&["electronics", "toys", "clothes", "decorations"]),
                multiplier: 2.0,
                windows: vec![EventWindow::Annual {
                    start: (12, 20),
                    end: (1, 7),
                }],
                explanation: Localized::new(
                    "Yangi yil bayrami! Bayram sovg'alari va bezaklari",
                    "С Новым годом! Праздничные подарки и украшения",
                ),
            },
        ];

        let seasons = vec![
            SeasonRule {
                season: Season::Spring,
                categories: strings(&["garden", "flowers", "cleaning", "navruz"]),
                explanation: Localized::new(
                    "Bahor mavsumi uchun tavsiya etilgan mahsulotlar",
                    "Товары, рекомендованные на весну",
                ),
            },
            SeasonRule {
                season: Season::Summer,
                categories: strings(&["cooling", "vacation", "fruits", "weddings"]),
                explanation: Localized::new(
                    "Yoz mavsumi uchun tavsiya etilgan mahsulotlar",
                    "Товары, рекомендованные на лето",
                ),
            },
            SeasonRule {
                season: Season::Autumn,
                categories: strings(&["harvest", "warm_clothes", "school"]),
                explanation: Localized::new(
                    "Kuz mavsumi uchun tavsiya etilgan mahsulotlar",
                    "Товары, рекомендованные на осень",
                ),
            },
            SeasonRule {
                season: Season::Winter,
                categories: strings(&["heating", "warm_food", "new_year"]),
                explanation: Localized::new(
                    "Qish mavsumi uchun tavsiya etilgan mahsulotlar",
                    "Товары, рекомендованные на зиму",
                ),
            },
        ];

        let region_categories = BTreeMap::from([
            (Region::Tsh, strings(&["electronics", "fashion", "home_appliances"])),
            (Region::Sam, strings(&["handicrafts", "ceramics", "tourism"])),
            (Region::Bux, strings(&["handicrafts", "carpets", "jewelry"])),
            (Region::And, strings(&["textiles", "fruits"])),
            (Region::Far, strings(&["silk", "textiles", "ceramics"])),
            (Region::Nam, strings(&["fruits", "textiles"])),
            (Region::Qas, strings(&["agriculture", "carpets"])),
            (Region::Sur, strings(&["agriculture", "fruits"])),
            (Region::Nav, strings(&["construction", "tools"])),
            (Region::Jiz, strings(&["agriculture", "tools"])),
            (Region::Sir, strings(&["agriculture", "cotton"])),
            (Region::Xor, strings(&["handicrafts", "melons"])),
            (Region::Qor, strings(&["handicrafts", "fish"])),
        ]);

        Self {
            events,
            seasons,
            region_categories,
        }
    }

    /// Every event must amplify and every season must have a rule
    pub fn validate(&self) -> Result<(), TrainingError> {
        for event in &self.events {
            if !(event.multiplier.is_finite() && event.multiplier > 1.0) {
                return Err(TrainingError::InvalidRule(format!(
                    "event {} has multiplier {}, expected a value above 1.0",
                    event.key, event.multiplier
                )));
            }
            if event.branch == CulturalBranch::Seasonal {
                return Err(TrainingError::InvalidRule(format!(
                    "event {} cannot use the seasonal branch",
                    event.key
                )));
            }
        }

        for season in [Season::Spring, Season::Summer, Season::Autumn, Season::Winter] {
            if !self.seasons.iter().any(|rule| rule.season == season) {
                return Err(TrainingError::InvalidRule(format!(
                    "no categories for {season}"
                )));
            }
        }

        Ok(())
    }

    /// First active event by priority, if any
    fn active_event(&self, date: NaiveDate) -> Option<&CulturalEvent> {
        CulturalBranch::EVENTS.iter().find_map(|branch| {
            self.events
                .iter()
                .find(|event| event.branch == *branch && event.is_active(date))
        })
    }

    fn branch_active(&self, branch: CulturalBranch, date: NaiveDate) -> bool {
        self.events
            .iter()
            .any(|event| event.branch == branch && event.is_active(date))
    }

    pub fn context_for(&self, date: NaiveDate, region: &str, language: Language) -> CulturalContext {
        let season = Season::from_month(date.month());

        let (branch, event, mut categories, multiplier, explanation) = match self.active_event(date)
        {
            Some(event) => (
                event.branch,
                Some(event.key.clone()),
                event.categories.clone(),
                event.multiplier,
                event.explanation.get(language).to_string(),
            ),
            None => {
                let rule = self.seasons.iter().find(|rule| rule.season == season);
                (
                    CulturalBranch::Seasonal,
                    None,
                    rule.map(|r| r.categories.clone()).unwrap_or_default(),
                    1.0,
                    rule.map(|r| r.explanation.get(language).to_string())
                        .unwrap_or_default(),
                )
            }
        };

        if let Some(extra) = Region::lookup(region).and_then(|r| self.region_categories.get(&r)) {
            for category in extra {
                if !categories.contains(category) {
                    categories.push(category.clone());
                }
            }
        }

        CulturalContext {
            branch,
            event,
            season,
            categories,
            multiplier,
            explanation,
        }
    }

    pub fn market_factors(&self, date: NaiveDate, region: &str) -> MarketFactors {
        let context = self.context_for(date, region, Language::Uz);
        MarketFactors {
            season: context.season,
            is_observance_period: self.branch_active(CulturalBranch::Observance, date),
            is_festival_period: self.branch_active(CulturalBranch::Festival, date),
            user_region: region.to_string(),
            cultural_branch: context.branch,
            cultural_multiplier: context.multiplier,
        }
    }

    /// Active catalog products in the relevant categories, ordered by
    /// `vendor_rating × cultural_relevance × multiplier` descending.
    pub async fn score(
        &self,
        catalog: &dyn CatalogStore,
        profile: &UserProfile,
        date: NaiveDate,
        limit: usize,
    ) -> AppResult<Vec<SignalCandidate>> {
        let context = self.context_for(date, &profile.region, profile.language);
        if context.categories.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            branch = ?context.branch,
            categories = context.categories.len(),
            multiplier = context.multiplier,
            "Querying cultural candidates"
        );

        let products = catalog
            .query_by_category(&context.categories, context.multiplier, limit)
            .await?;

        let mut candidates: Vec<SignalCandidate> = products
            .iter()
            .map(|product| {
                SignalCandidate::new(
                    product.product_id.clone(),
                    product.cultural_score(context.multiplier),
                    Reason::CulturalRelevance,
                )
                .with_cultural_factor(context.explanation.clone())
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);

        Ok(candidates)
    }
}
