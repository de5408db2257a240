//! PostgreSQL [`BracketRepository`] implementation.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::{collections::BTreeSet, sync::Arc};

use super::{
    Advancement, BracketRepository, CategorySnapshot, MatchContext, MatchOutcome, NewBracket,
    NewMatch, StoreError, StoreResult,
};
use crate::bracket::models::{
    Category, CategoryId, CategoryParticipant, Enrollment, Match, MatchId, MatchRelation,
    MatchSlot, MatchStatus, Participant, ParticipantId, SlotId,
};

const MATCH_COLUMNS: &str = "id, category_id, round, match_number, start_time, status";
const SLOT_COLUMNS: &str =
    "id, match_id, participant_id, role, position, score, rank, result_type";
const RELATION_COLUMNS: &str = "id, source_match_id, target_match_id, qualifier_rank";

/// Bracket store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBracketStore {
    pool: Arc<PgPool>,
}

impl PgBracketStore {
    /// Create a new store
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

fn category_from_row(row: &PgRow) -> StoreResult<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        order: row.try_get("sort_order")?,
        can_sign_up: row.try_get("can_sign_up")?,
        is_bracket: row.try_get("is_bracket")?,
    })
}

fn participant_from_row(row: &PgRow) -> StoreResult<Participant> {
    Ok(Participant {
        id: row.try_get("id")?,
        club_id: row.try_get("club_id")?,
        name: row.try_get("name")?,
    })
}

fn match_from_row(row: &PgRow) -> StoreResult<Match> {
    Ok(Match {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        round: row.try_get("round")?,
        match_number: row.try_get("match_number")?,
        start_time: row.try_get("start_time")?,
        status: row.try_get::<String, _>("status")?.parse()?,
    })
}

fn slot_from_row(row: &PgRow) -> StoreResult<MatchSlot> {
    let result_type = row
        .try_get::<Option<String>, _>("result_type")?
        .map(|label| label.parse())
        .transpose()?;

    Ok(MatchSlot {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        participant_id: row.try_get("participant_id")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        position: row.try_get("position")?,
        score: row.try_get("score")?,
        rank: row.try_get("rank")?,
        result_type,
    })
}

fn relation_from_row(row: &PgRow) -> StoreResult<MatchRelation> {
    Ok(MatchRelation {
        id: row.try_get("id")?,
        source_match_id: row.try_get("source_match_id")?,
        target_match_id: row.try_get("target_match_id")?,
        qualifier_rank: row.try_get("qualifier_rank")?,
    })
}

fn decode_all<T>(rows: &[PgRow], decode: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

#[async_trait]
impl BracketRepository for PgBracketStore {
    async fn get_category(&self, category_id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, sort_order, can_sign_up, is_bracket
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StoreResult<Option<Participant>> {
        let row = sqlx::query("SELECT id, club_id, name FROM participants WHERE id = $1")
            .bind(participant_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.as_ref().map(participant_from_row).transpose()
    }

    async fn get_enrollment(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
    ) -> StoreResult<Option<Enrollment>> {
        let row = sqlx::query(
            r#"
            SELECT seed
            FROM participant_categories
            WHERE participant_id = $1 AND category_id = $2
            "#,
        )
        .bind(participant_id)
        .bind(category_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match row {
            Some(row) => Ok(Some(Enrollment {
                participant_id,
                category_id,
                seed: row.try_get("seed")?,
            })),
            None => Ok(None),
        }
    }

    async fn count_matches(&self, category_id: CategoryId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn load_match_context(&self, match_id: MatchId) -> StoreResult<Option<MatchContext>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1"))
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let fixture = match_from_row(&row)?;

        let category = sqlx::query(
            r#"
            SELECT id, name, sort_order, can_sign_up, is_bracket
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(fixture.category_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::CategoryNotFound(fixture.category_id))?;
        let category = category_from_row(&category)?;

        let slots = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM match_participants WHERE match_id = $1 ORDER BY id"
        ))
        .bind(match_id)
        .fetch_all(&mut *tx)
        .await?;

        let outgoing = sqlx::query(&format!(
            "SELECT {RELATION_COLUMNS} FROM match_relations WHERE source_match_id = $1 ORDER BY id"
        ))
        .bind(match_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(MatchContext {
            fixture,
            category,
            slots: decode_all(&slots, slot_from_row)?,
            outgoing: decode_all(&outgoing, relation_from_row)?,
        }))
    }

    async fn load_category_snapshot(
        &self,
        category_id: CategoryId,
    ) -> StoreResult<Option<CategorySnapshot>> {
        let mut tx = self.pool.begin().await?;

        // One snapshot for every read below
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let Some(row) = sqlx::query(
            r#"
            SELECT id, name, sort_order, can_sign_up, is_bracket
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };
        let category = category_from_row(&row)?;

        let matches = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE category_id = $1 ORDER BY id"
        ))
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;

        let slots = sqlx::query(
            r#"
            SELECT mp.id, mp.match_id, mp.participant_id, mp.role, mp.position,
                   mp.score, mp.rank, mp.result_type
            FROM match_participants mp
            JOIN matches m ON m.id = mp.match_id
            WHERE m.category_id = $1
            ORDER BY mp.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;

        let relations = sqlx::query(
            r#"
            SELECT r.id, r.source_match_id, r.target_match_id, r.qualifier_rank
            FROM match_relations r
            JOIN matches m ON m.id = r.target_match_id
            WHERE m.category_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;

        let enrolled_rows = sqlx::query(
            r#"
            SELECT p.id, p.club_id, p.name, pc.seed
            FROM participant_categories pc
            JOIN participants p ON p.id = pc.participant_id
            WHERE pc.category_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;

        let occupants = sqlx::query(
            r#"
            SELECT DISTINCT p.id, p.club_id, p.name
            FROM match_participants mp
            JOIN matches m ON m.id = mp.match_id
            JOIN participants p ON p.id = mp.participant_id
            WHERE m.category_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let enrolled = enrolled_rows
            .iter()
            .map(|row| {
                Ok(CategoryParticipant {
                    participant: participant_from_row(row)?,
                    seed: row.try_get("seed")?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(CategorySnapshot {
            category,
            matches: decode_all(&matches, match_from_row)?,
            slots: decode_all(&slots, slot_from_row)?,
            relations: decode_all(&relations, relation_from_row)?,
            enrolled,
            occupants: decode_all(&occupants, participant_from_row)?,
        }))
    }

    async fn upsert_seed(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
        seed: i32,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO participant_categories (participant_id, category_id, seed)
            VALUES ($1, $2, $3)
            ON CONFLICT (participant_id, category_id) DO UPDATE SET seed = EXCLUDED.seed
            "#,
        )
        .bind(participant_id)
        .bind(category_id)
        .bind(seed)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_bracket(
        &self,
        category_id: CategoryId,
        bracket: &NewBracket,
    ) -> StoreResult<Vec<MatchId>> {
        let count = bracket.matches.len();
        if let Some(rel) = bracket
            .relations
            .iter()
            .find(|r| r.source >= count || r.target >= count)
        {
            return Err(StoreError::InvalidWrite(format!(
                "relation {} -> {} outside {} matches",
                rel.source, rel.target, count
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Serializes concurrent builders of the same category
        sqlx::query("SELECT id FROM categories WHERE id = $1 FOR UPDATE")
            .bind(category_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::CategoryNotFound(category_id))?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE category_id = $1")
                .bind(category_id)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            return Err(StoreError::CategoryNotEmpty(category_id));
        }

        let seeded: Vec<ParticipantId> = bracket.seeds.iter().map(|&(p, _)| p).collect();
        for &(participant_id, seed) in &bracket.seeds {
            let holder: Option<ParticipantId> = sqlx::query_scalar(
                r#"
                SELECT participant_id
                FROM participant_categories
                WHERE category_id = $1 AND seed = $2 AND NOT (participant_id = ANY($3))
                LIMIT 1
                "#,
            )
            .bind(category_id)
            .bind(seed)
            .bind(&seeded)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(holder) = holder {
                return Err(StoreError::SeedTaken {
                    participant_id,
                    seed,
                    holder,
                });
            }
        }

        for &(participant_id, seed) in &bracket.seeds {
            sqlx::query(
                r#"
                INSERT INTO participant_categories (participant_id, category_id, seed)
                VALUES ($1, $2, $3)
                ON CONFLICT (participant_id, category_id) DO UPDATE SET seed = EXCLUDED.seed
                "#,
            )
            .bind(participant_id)
            .bind(category_id)
            .bind(seed)
            .execute(&mut *tx)
            .await?;
        }

        let mut ids = Vec::with_capacity(count);
        for new_match in &bracket.matches {
            let match_id: MatchId = sqlx::query_scalar(
                r#"
                INSERT INTO matches (category_id, round, match_number, status)
                VALUES ($1, $2, $3, 'scheduled')
                RETURNING id
                "#,
            )
            .bind(category_id)
            .bind(new_match.round)
            .bind(new_match.match_number)
            .fetch_one(&mut *tx)
            .await?;

            for slot in &new_match.slots {
                sqlx::query(
                    r#"
                    INSERT INTO match_participants (match_id, participant_id, role, position)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(match_id)
                .bind(slot.participant_id)
                .bind(slot.role.as_str())
                .bind(slot.position.as_deref())
                .execute(&mut *tx)
                .await?;
            }

            ids.push(match_id);
        }

        for rel in &bracket.relations {
            sqlx::query(
                r#"
                INSERT INTO match_relations (source_match_id, target_match_id, qualifier_rank)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(ids[rel.source])
            .bind(ids[rel.target])
            .bind(rel.qualifier_rank)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE categories SET can_sign_up = FALSE WHERE id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ids)
    }

    async fn insert_flat_match(
        &self,
        category_id: CategoryId,
        new_match: &NewMatch,
    ) -> StoreResult<MatchId> {
        let mut tx = self.pool.begin().await?;

        let can_sign_up: bool =
            sqlx::query_scalar("SELECT can_sign_up FROM categories WHERE id = $1 FOR UPDATE")
                .bind(category_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::CategoryNotFound(category_id))?;
        if !can_sign_up {
            return Err(StoreError::SignUpClosed(category_id));
        }

        let match_id: MatchId = sqlx::query_scalar(
            r#"
            INSERT INTO matches (category_id, round, match_number, status)
            VALUES ($1, $2, $3, 'scheduled')
            RETURNING id
            "#,
        )
        .bind(category_id)
        .bind(new_match.round)
        .bind(new_match.match_number)
        .fetch_one(&mut *tx)
        .await?;

        for slot in &new_match.slots {
            sqlx::query(
                r#"
                INSERT INTO match_participants (match_id, participant_id, role, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(match_id)
            .bind(slot.participant_id)
            .bind(slot.role.as_str())
            .bind(slot.position.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE categories SET is_bracket = FALSE WHERE id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(match_id)
    }

    async fn commit_outcome(&self, outcome: &MatchOutcome) -> StoreResult<Vec<Advancement>> {
        let mut tx = self.pool.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM matches WHERE id = $1 FOR UPDATE")
                .bind(outcome.match_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::MatchNotFound(outcome.match_id))?;
        if status.parse::<MatchStatus>()? == MatchStatus::Completed {
            return Err(StoreError::MatchAlreadyCompleted(outcome.match_id));
        }

        // Read under the row lock; feeders lock this row before adding a slot
        let current: Vec<SlotId> =
            sqlx::query_scalar("SELECT id FROM match_participants WHERE match_id = $1")
                .bind(outcome.match_id)
                .fetch_all(&mut *tx)
                .await?;
        let current: BTreeSet<SlotId> = current.into_iter().collect();
        let planned: BTreeSet<SlotId> = outcome.results.iter().map(|r| r.slot_id).collect();
        if planned != current {
            return Err(StoreError::MatchChanged(outcome.match_id));
        }

        let mut targets: Vec<MatchId> = outcome
            .advancements
            .iter()
            .map(|a| a.target_match_id)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        if !targets.is_empty() {
            let locked: Vec<MatchId> = sqlx::query_scalar(
                "SELECT id FROM matches WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            )
            .bind(&targets)
            .fetch_all(&mut *tx)
            .await?;
            if let Some(&missing) = targets.iter().find(|id| !locked.contains(id)) {
                return Err(StoreError::MatchNotFound(missing));
            }
        }

        sqlx::query("UPDATE matches SET status = $1 WHERE id = $2")
            .bind(MatchStatus::Completed.as_str())
            .bind(outcome.match_id)
            .execute(&mut *tx)
            .await?;

        for result in &outcome.results {
            let updated = sqlx::query(
                r#"
                UPDATE match_participants
                SET rank = $1, result_type = $2
                WHERE id = $3 AND match_id = $4
                "#,
            )
            .bind(result.rank)
            .bind(result.result_type.as_str())
            .bind(result.slot_id)
            .bind(outcome.match_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::InvalidWrite(format!(
                    "slot {} does not belong to match {}",
                    result.slot_id, outcome.match_id
                )));
            }
        }

        let mut inserted = Vec::with_capacity(outcome.advancements.len());
        for advancement in &outcome.advancements {
            let row = sqlx::query(
                r#"
                INSERT INTO match_participants (match_id, participant_id, role)
                VALUES ($1, $2, 'competitor')
                ON CONFLICT (match_id, participant_id) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(advancement.target_match_id)
            .bind(advancement.participant_id)
            .fetch_optional(&mut *tx)
            .await?;

            if row.is_some() {
                inserted.push(*advancement);
            }
        }

        tx.commit().await?;

        Ok(inserted)
    }
}
