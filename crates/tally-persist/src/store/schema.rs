// SQL for the `api_usages` table

pub(crate) const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS api_usages (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        model TEXT NOT NULL,
        system_fingerprint TEXT,
        prompt TEXT NOT NULL,
        completion TEXT NOT NULL,
        prompt_tokens INTEGER NOT NULL,
        completion_tokens INTEGER NOT NULL,
        total_tokens INTEGER NOT NULL,
        cached_tokens INTEGER DEFAULT 0,
        cache_hit_tokens INTEGER DEFAULT 0,
        cache_miss_tokens INTEGER DEFAULT 0,
        finish_reason TEXT,
        logprobs TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_model ON api_usages(model);
    CREATE INDEX IF NOT EXISTS idx_created_at ON api_usages(created_at);";

pub(crate) const INSERT_USAGE: &str = "INSERT INTO api_usages (
        id, created_at, model, system_fingerprint, prompt, completion,
        prompt_tokens, completion_tokens, total_tokens,
        cached_tokens, cache_hit_tokens, cache_miss_tokens,
        finish_reason, logprobs
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

// LIMIT -1 means no limit in SQLite
pub(crate) const SELECT_USAGES: &str = "SELECT
        id, created_at, model, system_fingerprint, prompt, completion,
        prompt_tokens, completion_tokens, total_tokens,
        cached_tokens, cache_hit_tokens, cache_miss_tokens,
        finish_reason, logprobs
    FROM api_usages
    ORDER BY rowid
    LIMIT ?1";

pub(crate) const COUNT_REQUESTS: &str = "SELECT COUNT(*) FROM api_usages";

pub(crate) const SUM_TOKENS: &str = "SELECT COALESCE(SUM(total_tokens), 0) FROM api_usages";

pub(crate) const COUNT_BY_MODEL: &str = "SELECT model, COUNT(*) FROM api_usages GROUP BY model";
