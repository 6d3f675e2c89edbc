use std::ops::DerefMut;

use sqlx::PgConnection;
use uuid::Uuid;

use super::error::StoreError;

mod conversation;
mod meal;
mod nutrition;
mod user;

pub use conversation::ConversationRepository;
pub use meal::{MealLogRepository, NewMealLog};
pub use nutrition::NutritionSummaryRepository;
pub use user::UserRepository;

/// Entry point to the repositories over one connection.
///
/// `C` is either a pooled connection or an open transaction; every
/// repository handed out borrows it, so all of them see the same
/// transactional state.
pub struct Repositories<C> {
    conn: C,
}

impl<C> Repositories<C>
where
    C: DerefMut<Target = PgConnection>,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    pub fn users(&mut self) -> UserRepository<'_> {
        UserRepository::new(&mut self.conn)
    }

    pub fn conversations(&mut self) -> ConversationRepository<'_> {
        ConversationRepository::new(&mut self.conn)
    }

    pub fn meal_logs(&mut self) -> MealLogRepository<'_> {
        MealLogRepository::new(&mut self.conn)
    }

    pub fn nutrition(&mut self) -> NutritionSummaryRepository<'_> {
        NutritionSummaryRepository::new(&mut self.conn)
    }
}

/// Identifier input accepted by the repositories. Strings are parsed before
/// any query is issued.
pub trait IntoId {
    fn into_id(self, field: &'static str) -> Result<Uuid, StoreError>;
}

impl IntoId for Uuid {
    fn into_id(self, _field: &'static str) -> Result<Uuid, StoreError> {
        Ok(self)
    }
}

impl IntoId for &str {
    fn into_id(self, field: &'static str) -> Result<Uuid, StoreError> {
        Uuid::parse_str(self.trim()).map_err(|source| StoreError::InvalidId {
            field,
            value: self.to_string(),
            source,
        })
    }
}

impl IntoId for &String {
    fn into_id(self, field: &'static str) -> Result<Uuid, StoreError> {
        self.as_str().into_id(field)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::IntoId;
    use crate::db::error::StoreError;

    #[test]
    fn string_ids_are_parsed_and_trimmed() {
        let id = Uuid::now_v7();
        assert_eq!(format!(" {id} ").as_str().into_id("user_id").unwrap(), id);
        assert_eq!(id.into_id("user_id").unwrap(), id);
    }

    #[test]
    fn malformed_id_names_the_field() {
        let err = "not-a-uuid".into_id("meal_id").unwrap_err();
        match err {
            StoreError::InvalidId { field, value, .. } => {
                assert_eq!(field, "meal_id");
                assert_eq!(value, "not-a-uuid");
            }
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }
}
