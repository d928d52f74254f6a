//! Durable storage of retired players' results.
//!
//! The PostgreSQL store owns its pooled connections and prepares its
//! schema on connect. [`MemoryChampions`] implements the same contract in
//! memory and backs the test suites.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::app::{Champion, ChampionRepository};

pub struct PostgresChampions {
    pool: PgPool,
}

impl PostgresChampions {
    /// Connects to the database and prepares the `retired_players` table
    /// and its ranking index.
    pub async fn connect(db_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(db_url)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS retired_players (
                 id UUID PRIMARY KEY,
                 name varchar(100) NOT NULL,
                 score integer CHECK (score >= 0) NOT NULL,
                 play_time_ms integer CHECK (play_time_ms >= 0) NOT NULL)",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS results_show
                 ON retired_players (score DESC, play_time_ms, name)",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ChampionRepository for PostgresChampions {
    async fn save(&self, champion: &Champion) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO retired_players (id, name, score, play_time_ms)
                 VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(&champion.name)
        .bind(champion.score as i32)
        .bind((champion.play_time * 1000.0) as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn top(&self, start: usize, max_items: usize) -> anyhow::Result<Vec<Champion>> {
        let rows: Vec<(String, i32, i32)> = sqlx::query_as(
            "SELECT name, score, play_time_ms FROM retired_players
                 ORDER BY score DESC, play_time_ms, name
                 LIMIT $1 OFFSET $2",
        )
        .bind(max_items as i64)
        .bind(start as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(name, score, play_time_ms)| Champion {
                name,
                score: score as u64,
                play_time: play_time_ms as f64 / 1000.0,
            })
            .collect())
    }
}

/// In-memory twin of the Postgres store with the same ranking contract.
#[derive(Debug, Default)]
pub struct MemoryChampions {
    records: Mutex<Vec<Champion>>,
}

impl MemoryChampions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChampionRepository for MemoryChampions {
    async fn save(&self, champion: &Champion) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(champion.clone());
        Ok(())
    }

    async fn top(&self, start: usize, max_items: usize) -> anyhow::Result<Vec<Champion>> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        records.sort_by(|left, right| {
            right
                .score
                .cmp(&left.score)
                .then(left.play_time.total_cmp(&right.play_time))
                .then(left.name.cmp(&right.name))
        });
        Ok(records.into_iter().skip(start).take(max_items).collect())
    }
}
