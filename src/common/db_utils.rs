use sqlx::PgConnection;

use crate::common::error::AppError;

// ---
// Helper de lock: a "Chave" da árvore
// ---
/// Trava a tabela `institutions` até o fim da transação corrente.
///
/// SHARE ROW EXCLUSIVE conflita consigo mesmo e com qualquer escrita, mas não
/// com SELECT: dois moves nunca intercalam e leitores continuam vendo a última
/// árvore confirmada.
pub(crate) async fn lock_institution_tree(conn: &mut PgConnection) -> Result<(), AppError> {
    sqlx::query("LOCK TABLE institutions IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
