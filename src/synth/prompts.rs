//! Prompt text for synthesis and repair

pub fn synthesis_prompt(question: &str, schema: &str, dataset_name: &str) -> String {
    format!(
        "You translate analytics questions into a single PostgreSQL SELECT statement.

Dataset: {dataset_name}

Schema:
{schema}

Rules:
- Write exactly one read-only SELECT statement. Never modify data or schema.
- Qualify every table with its schema name, as listed above.
- Aggregate with GROUP BY where needed and sort with ORDER BY when the question implies an order.
- Add LIMIT only when the question asks for a specific number of rows.
- Do not use comments, UNION, or more than one statement.
- Reply with the SQL only. No prose, no markdown.

Question:
{question}
"
    )
}

pub fn repair_prompt(question: &str, failing_sql: &str, error: &str, schema: &str) -> String {
    format!(
        "The PostgreSQL query below failed. Produce a corrected query.

Question:
{question}

Query:
{failing_sql}

Database error:
{error}

Schema:
{schema}

Keep the same intent, fix the cause of the error, and use only tables and columns from the schema.
The result must be a single read-only SELECT statement.
Reply with the SQL only. No prose, no markdown.
"
    )
}
