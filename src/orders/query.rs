use uuid::Uuid;

use crate::orders::models::OrderStatus;

/// SQL query builder for the order list endpoint.
/// Builds a filtered, paginated SELECT plus a matching COUNT query that
/// shares the same WHERE clause. All filter values are bound as text and
/// cast in SQL where a narrower type is needed.
pub struct OrderQueryBuilder {
    where_clauses: Vec<String>,
    params: Vec<String>,
    limit: i64,
    offset: i64,
}

impl OrderQueryBuilder {
    pub fn new() -> Self {
        Self {
            where_clauses: Vec::new(),
            params: Vec::new(),
            limit: 10,
            offset: 0,
        }
    }

    /// Restricts results to one customer's orders.
    pub fn scope_to_customer(&mut self, customer_id: Uuid) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("customer_id = ${}::uuid", param_index));
        self.params.push(customer_id.to_string());
    }

    /// Filters by exact order status.
    pub fn add_status_filter(&mut self, status: OrderStatus) {
        let param_index = self.params.len() + 1;
        self.where_clauses.push(format!("status = ${}", param_index));
        self.params.push(status.as_str().to_string());
    }

    /// Adds a case-insensitive partial match over the order number and the
    /// owning customer's name and email. One bound parameter, referenced
    /// from every branch.
    pub fn add_search_filter(&mut self, search: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses.push(format!(
            "(order_number ILIKE ${i} OR customer_id IN \
             (SELECT id FROM customers \
              WHERE first_name ILIKE ${i} OR last_name ILIKE ${i} OR email ILIKE ${i}))",
            i = param_index
        ));
        self.params.push(format!("%{}%", search));
    }

    /// Sets pagination from a 1-indexed page number.
    pub fn set_pagination(&mut self, page: i64, limit: i64) {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        self.limit = limit;
        self.offset = (page - 1) * limit;
    }

    fn where_sql(&self) -> String {
        if self.where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clauses.join(" AND "))
        }
    }

    /// Builds the page query and its parameters. Newest orders first;
    /// LIMIT/OFFSET are validated integers and inlined.
    pub fn build(&self) -> (String, Vec<String>) {
        let query = format!(
            "SELECT * FROM orders{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            self.where_sql(),
            self.limit,
            self.offset
        );
        (query, self.params.clone())
    }

    /// Builds the COUNT query over the same filters.
    pub fn build_count(&self) -> (String, Vec<String>) {
        let query = format!("SELECT COUNT(*) FROM orders{}", self.where_sql());
        (query, self.params.clone())
    }
}

impl Default for OrderQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_query_has_ordering_and_pagination() {
        let builder = OrderQueryBuilder::new();
        let (query, params) = builder.build();

        assert!(query.starts_with("SELECT * FROM orders"));
        assert!(query.contains("ORDER BY created_at DESC"));
        assert!(query.contains("LIMIT 10"));
        assert!(query.contains("OFFSET 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_customer_scope_binds_uuid() {
        let mut builder = OrderQueryBuilder::new();
        let id = Uuid::new_v4();
        builder.scope_to_customer(id);
        let (query, params) = builder.build();

        assert!(query.contains("customer_id = $1::uuid"));
        assert_eq!(params[0], id.to_string());
    }

    #[test]
    fn test_combined_filters_number_sequentially() {
        let mut builder = OrderQueryBuilder::new();
        builder.scope_to_customer(Uuid::new_v4());
        builder.add_status_filter(OrderStatus::Processing);
        builder.add_search_filter("2508");
        let (query, params) = builder.build();

        assert!(query.contains("customer_id = $1::uuid"));
        assert!(query.contains("status = $2"));
        assert!(query.contains("order_number ILIKE $3"));
        assert_eq!(params[1], "PROCESSING");
        assert_eq!(params[2], "%2508%");
    }

    #[test]
    fn test_search_covers_customer_name_and_email() {
        let mut builder = OrderQueryBuilder::new();
        builder.add_search_filter("amal");
        let (query, params) = builder.build();

        assert!(query.contains("order_number ILIKE $1"));
        assert!(query.contains("first_name ILIKE $1"));
        assert!(query.contains("last_name ILIKE $1"));
        assert!(query.contains("email ILIKE $1"));
        // One pattern bound once, referenced from every branch
        assert_eq!(params, vec!["%amal%".to_string()]);
    }

    #[test]
    fn test_count_query_shares_filters() {
        let mut builder = OrderQueryBuilder::new();
        builder.add_status_filter(OrderStatus::Pending);
        let (count_query, params) = builder.build_count();

        assert!(count_query.starts_with("SELECT COUNT(*) FROM orders"));
        assert!(count_query.contains("status = $1"));
        assert!(!count_query.contains("LIMIT"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_pagination_offsets() {
        let mut builder = OrderQueryBuilder::new();
        builder.set_pagination(3, 20);
        let (query, _) = builder.build();

        assert!(query.contains("LIMIT 20"));
        assert!(query.contains("OFFSET 40"));
    }

    #[test]
    fn test_pagination_clamps_bad_input() {
        let mut builder = OrderQueryBuilder::new();
        builder.set_pagination(0, 1000);
        let (query, _) = builder.build();

        assert!(query.contains("LIMIT 100"));
        assert!(query.contains("OFFSET 0"));
    }
}
