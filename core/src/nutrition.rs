//! Aggregation of meal logs into daily and weekly summaries.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{DailyNutritionSummary, Macros, MealLog};

/// Monday of the ISO week containing `date`, clamped to the first
/// representable day.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(back).unwrap_or(NaiveDate::MIN)
}

/// Sunday of the week starting at `monday`, clamped to the last
/// representable day.
pub fn week_end(monday: NaiveDate) -> NaiveDate {
    monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX)
}

/// Macro totals for a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayTotals {
    pub totals: Macros,
    pub meal_count: i32,
}

impl DayTotals {
    pub fn from_meals(meals: &[MealLog]) -> Self {
        let mut totals = Macros::default();
        for meal in meals {
            totals.add(&meal.macros);
        }
        Self {
            totals,
            meal_count: meals.len() as i32,
        }
    }
}

/// Macro totals and daily averages for a week.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeekTotals {
    pub totals: Macros,
    pub averages: Macros,
    pub meal_count: i32,
    /// Days of the week with at least one logged meal
    pub days_logged: i32,
}

impl WeekTotals {
    /// Averages divide by days that have meals, so a half-logged week is not
    /// diluted by empty days.
    pub fn from_days(days: &[DailyNutritionSummary]) -> Self {
        let mut totals = Macros::default();
        let mut meal_count = 0;
        let mut days_logged = 0;

        for day in days {
            totals.add(&Macros {
                calories: day.total_calories,
                protein: day.total_protein,
                carbs: day.total_carbs,
                fat: day.total_fat,
            });
            meal_count += day.meal_count;
            if day.meal_count > 0 {
                days_logged += 1;
            }
        }

        let averages = if days_logged == 0 {
            Macros::default()
        } else {
            let n = f64::from(days_logged);
            Macros {
                calories: totals.calories / n,
                protein: totals.protein / n,
                carbs: totals.carbs / n,
                fat: totals.fat / n,
            }
        };

        Self {
            totals,
            averages,
            meal_count,
            days_logged,
        }
    }
}
