use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        use_cases::invoice::InvoiceRepo,
    },
    domain::entities::invoice::{Invoice, InvoiceItem, InvoiceWithItems},
};

fn row_to_invoice(row: sqlx::postgres::PgRow) -> Invoice {
    Invoice {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        subscription_id: row.get("subscription_id"),
        invoice_number: row.get("invoice_number"),
        status: row.get("status"),
        subtotal: row.get("subtotal"),
        tax_amount: row.get("tax_amount"),
        discount_amount: row.get("discount_amount"),
        total: row.get("total"),
        currency: row.get("currency"),
        issue_date: row.get("issue_date"),
        due_date: row.get("due_date"),
        paid_at: row.get("paid_at"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_item(row: sqlx::postgres::PgRow) -> InvoiceItem {
    InvoiceItem {
        id: row.get("id"),
        invoice_id: row.get("invoice_id"),
        description: row.get("description"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        amount: row.get("amount"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, organization_id, subscription_id, invoice_number, status,
    subtotal, tax_amount, discount_amount, total, currency,
    issue_date, due_date, paid_at, notes, created_at, updated_at
"#;

const ITEM_COLS: &str =
    "id, invoice_id, description, quantity, unit_price, amount, created_at, updated_at";

/// Writes an invoice and its items on `conn`. Callers own the transaction.
pub(super) async fn insert_invoice(
    conn: &mut PgConnection,
    invoice: &InvoiceWithItems,
) -> AppResult<()> {
    let header = &invoice.invoice;
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, organization_id, subscription_id, invoice_number, status,
            subtotal, tax_amount, discount_amount, total, currency,
            issue_date, due_date, paid_at, notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(header.id)
    .bind(header.organization_id)
    .bind(header.subscription_id)
    .bind(&header.invoice_number)
    .bind(header.status)
    .bind(header.subtotal)
    .bind(header.tax_amount)
    .bind(header.discount_amount)
    .bind(header.total)
    .bind(&header.currency)
    .bind(header.issue_date)
    .bind(header.due_date)
    .bind(header.paid_at)
    .bind(&header.notes)
    .bind(header.created_at)
    .bind(header.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(AppError::from)?;

    for item in &invoice.items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(item.invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(AppError::from)?;
    }
    Ok(())
}

impl PostgresPersistence {
    async fn attach_items(&self, invoice: Invoice) -> AppResult<InvoiceWithItems> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = $1 AND deleted_at IS NULL ORDER BY created_at, id",
            ITEM_COLS
        ))
        .bind(invoice.id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(InvoiceWithItems {
            invoice,
            items: rows.into_iter().map(row_to_item).collect(),
        })
    }

    async fn fetch_invoice_page(
        &self,
        filter: &str,
        order: &str,
        binds: InvoiceFilter,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        let count_sql = format!(
            "SELECT COUNT(*) FROM invoices WHERE deleted_at IS NULL {}",
            filter
        );
        let list_sql = format!(
            "SELECT {} FROM invoices WHERE deleted_at IS NULL {} ORDER BY {} LIMIT {} OFFSET {}",
            SELECT_COLS,
            filter,
            order,
            page.limit(),
            page.offset()
        );

        let (total, rows) = match binds {
            InvoiceFilter::None => {
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                let rows = sqlx::query(&list_sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                (total, rows)
            }
            InvoiceFilter::Organization(organization_id) => {
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .bind(organization_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                let rows = sqlx::query(&list_sql)
                    .bind(organization_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                (total, rows)
            }
            InvoiceFilter::IssueDate(from, to) => {
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .bind(from)
                    .bind(to)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                let rows = sqlx::query(&list_sql)
                    .bind(from)
                    .bind(to)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                (total, rows)
            }
        };

        Ok(Page::new(
            rows.into_iter().map(row_to_invoice).collect(),
            total,
            page,
        ))
    }
}

enum InvoiceFilter {
    None,
    Organization(Uuid),
    IssueDate(DateTime<Utc>, DateTime<Utc>),
}

#[async_trait]
impl InvoiceRepo for PostgresPersistence {
    async fn next_invoice_sequence(&self) -> AppResult<i64> {
        let next: i64 = sqlx::query_scalar("SELECT nextval('invoice_number_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(next)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceWithItems>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Some(self.attach_items(row_to_invoice(row)).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_number(&self, invoice_number: &str) -> AppResult<Option<InvoiceWithItems>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE invoice_number = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Some(self.attach_items(row_to_invoice(row)).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Invoice>> {
        self.fetch_invoice_page("", "issue_date DESC, id", InvoiceFilter::None, page)
            .await
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        self.fetch_invoice_page(
            "AND organization_id = $1",
            "issue_date DESC, id",
            InvoiceFilter::Organization(organization_id),
            page,
        )
        .await
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE subscription_id = $1 AND deleted_at IS NULL ORDER BY issue_date, id",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE status NOT IN ('paid', 'canceled') AND due_date < $1 AND deleted_at IS NULL ORDER BY due_date, id",
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }

    async fn list_by_issue_date(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        self.fetch_invoice_page(
            "AND issue_date >= $1 AND issue_date <= $2",
            "issue_date DESC, id",
            InvoiceFilter::IssueDate(from, to),
            page,
        )
        .await
    }
}
