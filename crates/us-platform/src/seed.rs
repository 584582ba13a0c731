//! Sample data loaded at startup when `store.seed_sample_data` is set.

use chrono::{DateTime, Utc};

use us_common::{NewUser, User};

pub fn sample_users(now: DateTime<Utc>) -> Vec<User> {
    vec![
        User::from_candidate(
            "1".to_string(),
            NewUser::new("Ivan Ivanov", "ivan@example.com").with_phone_number("+79001234567"),
            now,
        ),
        User::from_candidate(
            "2".to_string(),
            NewUser::new("Petr Petrov", "petr@example.com").with_phone_number("+79007654321"),
            now,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use us_common::DEFAULT_STATUS;

    #[test]
    fn test_sample_users() {
        let now = Utc::now();
        let users = sample_users(now);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "1");
        assert_eq!(users[1].email, "petr@example.com");
        assert!(users.iter().all(|u| u.status == DEFAULT_STATUS && u.created_at == now));
    }
}
