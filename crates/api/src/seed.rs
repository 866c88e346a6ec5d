//! Demo data for running the server without a database.

use common::{Coordinates, DayId, UserId};
use store::{InMemoryObservationStore, ReferencedEvent, UserRecord};

/// Users available to the in-memory server: `(id, login, is_moderator)`.
pub const DEMO_USERS: [(i64, &str, bool); 3] = [
    (1, "astronomer", false),
    (2, "stargazer", false),
    (3, "moderator", true),
];

/// Observation days available to the in-memory server.
pub const DEMO_DAYS: [(i64, &str, f64, f64); 4] = [
    (1, "21.02.2025", 133.5752, 22.4028),
    (2, "20.03.2025", 158.8320, 11.7454),
    (3, "14.04.2025", 176.9010, 4.1187),
    (4, "09.05.2025", 191.2203, -2.6541),
];

/// Registers the demo users and days in `store`.
pub async fn demo_data(store: &InMemoryObservationStore) {
    for (id, login, is_moderator) in DEMO_USERS {
        store
            .add_user(UserRecord {
                id: UserId::new(id),
                login: login.to_string(),
                is_moderator,
            })
            .await;
    }

    for (id, label, ra, dec) in DEMO_DAYS {
        store
            .add_event(ReferencedEvent::new(
                DayId::new(id),
                label,
                Coordinates::new(ra, dec),
            ))
            .await;
    }

    tracing::info!(
        users = DEMO_USERS.len(),
        days = DEMO_DAYS.len(),
        "seeded in-memory store"
    );
}
