// src/services/rotation.rs

//! Rotating profile-card feeds.
//!
//! The demo account sees a small working set of cards per session key that
//! changes by a few entries on every refresh. Everyone else sees every card.
//! Working sets live in an injected `SessionCache` (LRU with TTL), never in
//! a global.

use std::{
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use lru::LruCache;
use parking_lot::Mutex;
use rand::{
    Rng,
    seq::{SliceRandom, index},
};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    models::{
        praise::CardPraise,
        user::{CardProfile, Role},
    },
};

/// Which card feed is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Student,
    Teacher,
}

impl FeedKind {
    pub fn role(&self) -> Role {
        match self {
            FeedKind::Student => Role::Student,
            FeedKind::Teacher => Role::Teacher,
        }
    }

    /// Cards in a demo session's working set.
    pub fn sample_size(&self) -> usize {
        match self {
            FeedKind::Student => 8,
            FeedKind::Teacher => 5,
        }
    }

    /// Praises shown per card.
    pub fn praise_cap(&self) -> usize {
        match self {
            FeedKind::Student => 5,
            FeedKind::Teacher => 3,
        }
    }

    /// Student cards fill empty slots with unselected teacher praises.
    pub fn backfills_teacher_praises(&self) -> bool {
        matches!(self, FeedKind::Student)
    }
}

struct SessionEntry {
    ids: Vec<i64>,
    touched: Instant,
}

type SessionKey = (FeedKind, String);

/// Bounded store of per-session working sets.
/// Least recently used keys are evicted at capacity; idle entries expire after `ttl`.
pub struct SessionCache {
    entries: Mutex<LruCache<SessionKey, SessionEntry>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Replaces the working set of `key` with `f(current)` under one lock.
    /// `current` is `None` for unknown or expired keys.
    pub fn update_at<F>(&self, key: SessionKey, now: Instant, f: F) -> Vec<i64>
    where
        F: FnOnce(Option<Vec<i64>>) -> Vec<i64>,
    {
        let mut entries = self.entries.lock();

        let current = match entries.pop(&key) {
            Some(entry) if now.duration_since(entry.touched) <= self.ttl => Some(entry.ids),
            _ => None,
        };

        let next = f(current);
        entries.put(
            key,
            SessionEntry {
                ids: next.clone(),
                touched: now,
            },
        );
        next
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks up to `size` distinct ids in random order.
pub fn initial_sample<R: Rng + ?Sized>(eligible: &[i64], size: usize, rng: &mut R) -> Vec<i64> {
    let mut pool = eligible.to_vec();
    pool.shuffle(rng);
    pool.truncate(size);
    pool
}

/// Advances a working set by one refresh.
///
/// Ids that are no longer eligible are dropped and the set is topped up to
/// `size`. Then `swaps` random positions are overwritten with eligible ids
/// not already shown; the other positions keep their ids.
pub fn rotate<R: Rng + ?Sized>(
    mut current: Vec<i64>,
    eligible: &[i64],
    size: usize,
    swaps: usize,
    rng: &mut R,
) -> Vec<i64> {
    let eligible_set: HashSet<i64> = eligible.iter().copied().collect();
    let mut seen = HashSet::new();
    current.retain(|id| eligible_set.contains(id) && seen.insert(*id));
    current.truncate(size);

    if current.is_empty() {
        return initial_sample(eligible, size, rng);
    }

    let present: HashSet<i64> = current.iter().copied().collect();
    let mut outside: Vec<i64> = eligible
        .iter()
        .copied()
        .filter(|id| !present.contains(id))
        .collect();
    outside.shuffle(rng);

    while current.len() < size {
        match outside.pop() {
            Some(id) => current.push(id),
            None => break,
        }
    }

    let swaps = swaps.min(outside.len()).min(current.len());
    for pos in index::sample(rng, current.len(), swaps) {
        if let Some(id) = outside.pop() {
            current[pos] = id;
        }
    }

    current
}

/// Keeps the demo account's working sets and rotates them.
pub struct RotationSampler {
    cache: SessionCache,
    swap_count: usize,
}

impl RotationSampler {
    pub fn new(cache: SessionCache) -> Self {
        Self {
            cache,
            swap_count: 1,
        }
    }

    pub fn with_swap_count(mut self, swap_count: usize) -> Self {
        self.swap_count = swap_count;
        self
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Returns the ids to display for this session, creating or rotating its working set.
    pub fn next_display_set<R: Rng + ?Sized>(
        &self,
        kind: FeedKind,
        session_key: &str,
        eligible: &[i64],
        rng: &mut R,
    ) -> Vec<i64> {
        self.next_display_set_at(kind, session_key, eligible, Instant::now(), rng)
    }

    pub fn next_display_set_at<R: Rng + ?Sized>(
        &self,
        kind: FeedKind,
        session_key: &str,
        eligible: &[i64],
        now: Instant,
        rng: &mut R,
    ) -> Vec<i64> {
        let size = kind.sample_size();
        let swaps = self.swap_count;

        self.cache
            .update_at((kind, session_key.to_string()), now, |current| match current {
                None => initial_sample(eligible, size, rng),
                Some(ids) => rotate(ids, eligible, size, swaps, rng),
            })
    }
}

/// One joined row of a user and (optionally) one praise they received.
#[derive(Debug, FromRow)]
pub struct FeedRow {
    pub id: i64,
    pub name: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,
    pub is_king: bool,

    pub praise_id: Option<i64>,
    pub content: Option<String>,
    pub is_selected: Option<bool>,
    pub is_teacher: Option<bool>,
    pub praise_created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A user with all live praises they received, newest first.
#[derive(Debug)]
pub struct FeedEntity {
    pub profile: CardProfile,
    pub praises: Vec<CardPraise>,
}

/// A rendered card.
#[derive(Debug, Serialize)]
pub struct ProfileCard {
    pub profile: CardProfile,
    pub praises: Vec<CardPraise>,
}

#[derive(Debug, Serialize)]
pub struct DisplaySet {
    pub kind: FeedKind,
    pub cards: Vec<ProfileCard>,
    /// Number of eligible entities, not the number of cards returned.
    pub total: usize,
}

/// Groups joined rows per user, keeping row order.
pub fn group_rows(rows: Vec<FeedRow>) -> Vec<FeedEntity> {
    let mut entities: Vec<FeedEntity> = Vec::new();
    let mut index_of: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let idx = *index_of.entry(row.id).or_insert_with(|| {
            entities.push(FeedEntity {
                profile: CardProfile {
                    id: row.id,
                    name: row.name.clone(),
                    school: row.school.clone(),
                    grade: row.grade,
                    class_number: row.class_number,
                    student_number: row.student_number,
                    is_king: row.is_king,
                },
                praises: Vec::new(),
            });
            entities.len() - 1
        });

        if let (Some(id), Some(content)) = (row.praise_id, row.content) {
            entities[idx].praises.push(CardPraise {
                id,
                content,
                is_selected: row.is_selected.unwrap_or(false),
                is_teacher: row.is_teacher.unwrap_or(false),
                created_at: row.praise_created_at,
            });
        }
    }

    entities
}

/// Selected praises up to `cap`, optionally backfilled with unselected
/// teacher-authored ones.
pub fn card_praises(praises: &[CardPraise], cap: usize, backfill_teacher: bool) -> Vec<CardPraise> {
    let mut shown: Vec<CardPraise> = praises
        .iter()
        .filter(|p| p.is_selected)
        .take(cap)
        .cloned()
        .collect();

    if backfill_teacher && shown.len() < cap {
        let missing = cap - shown.len();
        shown.extend(
            praises
                .iter()
                .filter(|p| !p.is_selected && p.is_teacher)
                .take(missing)
                .cloned(),
        );
    }

    shown
}

/// Renders cards for `display` ids in their order, or for every entity when `None`.
pub fn build_cards(kind: FeedKind, entities: Vec<FeedEntity>, display: Option<&[i64]>) -> Vec<ProfileCard> {
    let render = |entity: FeedEntity| ProfileCard {
        praises: card_praises(&entity.praises, kind.praise_cap(), kind.backfills_teacher_praises()),
        profile: entity.profile,
    };

    match display {
        None => entities.into_iter().map(render).collect(),
        Some(ids) => {
            let mut by_id: HashMap<i64, FeedEntity> =
                entities.into_iter().map(|e| (e.profile.id, e)).collect();
            ids.iter()
                .filter_map(|id| by_id.remove(id))
                .map(render)
                .collect()
        }
    }
}

/// Serves a card feed. `demo_phone_number` is excluded from every feed.
pub async fn get_display_set(
    pool: &PgPool,
    sampler: &RotationSampler,
    kind: FeedKind,
    session_key: &str,
    caller_is_distinguished: bool,
    demo_phone_number: Option<&str>,
) -> Result<DisplaySet, AppError> {
    let rows = sqlx::query_as::<_, FeedRow>(
        r#"
        SELECT
            u.id, u.name, u.school, u.grade, u.class_number, u.student_number, u.is_king,
            p.id AS praise_id, p.content, p.is_selected, p.is_teacher,
            p.created_at AS praise_created_at
        FROM users u
        LEFT JOIN praises p ON p.to_user_id = u.id AND NOT p.is_deleted
        WHERE u.role = $1 AND ($2::TEXT IS NULL OR u.phone_number <> $2)
        ORDER BY u.id, p.created_at DESC, p.id DESC
        "#,
    )
    .bind(kind.role().as_str())
    .bind(demo_phone_number)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load {:?} feed: {:?}", kind, e);
        AppError::from(e)
    })?;

    let entities = group_rows(rows);
    let total = entities.len();

    let cards = if caller_is_distinguished {
        let eligible: Vec<i64> = entities.iter().map(|e| e.profile.id).collect();
        let shown_ids = sampler.next_display_set(kind, session_key, &eligible, &mut rand::rng());
        tracing::debug!(?kind, session_key, shown = shown_ids.len(), "Rotated demo feed");
        build_cards(kind, entities, Some(&shown_ids))
    } else {
        build_cards(kind, entities, None)
    };

    Ok(DisplaySet { kind, cards, total })
}
