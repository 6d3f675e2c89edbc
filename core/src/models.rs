use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An app user. `username` is unique across the system.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Free-form profile data (goals, preferences). Always a JSON object when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chat thread. Each conversation is backed by exactly one agent session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Agent-service session id; unique per user
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Macronutrient values. Calories in kcal, the rest in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn add(&mut self, other: &Macros) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
    }
}

/// An assumption the nutrition agent made while estimating macros
/// (portion size, cooking oil, ...). Only `assumed_value` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Assumption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub assumed_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// "low" | "medium" | "high"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

pub const DEFAULT_ASSUMPTION_UNIT: &str = "g";

/// Structured output of the nutrition agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NutritionPayload {
    /// Short descriptive meal name, e.g. "Grilled Chicken Caesar Salad"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    pub macros: Macros,
    #[serde(default)]
    pub assumptions: Vec<Assumption>,
}

impl NutritionPayload {
    /// Fill in what the agent is allowed to omit: sequential assumption ids
    /// (`A1`, `A2`, ... by position) and the default unit.
    pub fn normalize(&mut self) {
        for (index, assumption) in self.assumptions.iter_mut().enumerate() {
            if assumption.id.as_deref().is_none_or(str::is_empty) {
                assumption.id = Some(format!("A{}", index + 1));
            }
            if assumption.unit.as_deref().is_none_or(str::is_empty) {
                assumption.unit = Some(DEFAULT_ASSUMPTION_UNIT.to_string());
            }
        }
    }

    /// Meal type reported by the agent, `Unspecified` when missing or unknown.
    pub fn meal_type(&self) -> MealType {
        self.meal_type
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    #[default]
    Unspecified,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            "unspecified" => Ok(MealType::Unspecified),
            other => Err(format!("unknown meal type '{other}'")),
        }
    }
}

/// Where a meal log's macros came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FoodSource {
    AiEstimated,
    Manual,
}

impl FoodSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodSource::AiEstimated => "ai_estimated",
            FoodSource::Manual => "manual",
        }
    }
}

impl fmt::Display for FoodSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FoodSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_estimated" => Ok(FoodSource::AiEstimated),
            "manual" => Ok(FoodSource::Manual),
            other => Err(format!("unknown food source '{other}'")),
        }
    }
}

/// One logged meal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MealLog {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub food_name: String,
    pub meal_type: MealType,
    pub recorded_at: DateTime<Utc>,
    pub macros: Macros,
    pub assumptions: Vec<Assumption>,
    pub food_source: FoodSource,
    /// Verbatim agent output the estimate was taken from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Per-day macro totals for one user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyNutritionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub meal_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-week macro totals and daily averages for one user. Weeks start on Monday.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeeklyNutritionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start_date: NaiveDate,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub avg_daily_calories: f64,
    pub avg_daily_protein: f64,
    pub avg_daily_carbs: f64,
    pub avg_daily_fat: f64,
    pub meal_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
