use tracing::info;

use crate::database::client::PgClientFactory;
use crate::database::executor::TenantExecutor;
use crate::database::manager::DatabaseError;
use crate::tenant::AllowList;

const CREATE_TASKS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id UUID PRIMARY KEY,
        title VARCHAR(100) NOT NULL,
        description VARCHAR(500),
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

/// Create each allowed tenant's schema and its `tasks` table if missing
pub async fn ensure_tenant_schemas(
    executor: &TenantExecutor<PgClientFactory>,
    allow_list: &AllowList,
) -> Result<(), DatabaseError> {
    for tenant in allow_list.tenants() {
        let schema = tenant.schema_name();
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted());

        executor
            .execute_public(move |conn| {
                Box::pin(async move {
                    sqlx::query(&create_schema).execute(&mut **conn).await?;
                    Ok::<_, DatabaseError>(())
                })
            })
            .await?;

        executor
            .execute_in_schema(&schema, |conn| {
                Box::pin(async move {
                    sqlx::query(CREATE_TASKS_TABLE).execute(&mut **conn).await?;
                    Ok::<_, DatabaseError>(())
                })
            })
            .await?;

        info!("Schema ready for tenant {} ({})", tenant, schema);
    }
    Ok(())
}
