//! 子代理各阶段的提示词模板
//!
//! 占位符用 {query} / {step} / {info} 等命名，调用处以 replace 填充。

pub const DECIDE_TOOL_SYSTEM_PROMPT: &str = r#"<role>You decide which retrieval tool best serves a given query.</role>

<goal>
Based on the query content, choose one of two sources: "vector_search" or "web_search".
</goal>

<decision_criteria>
- Use **vector_search** when the query is conceptual, asks for definitions or summaries, or concerns material already embedded in the knowledge base.
- Use **web_search** when the query needs fresh, up-to-date, or news-like information not present in the knowledge base.
</decision_criteria>

<warning>
- Return exactly one of the two values: "vector_search" or "web_search".
- Do not explain. Output only the tool name.
</warning>"#;

pub const DECIDE_TOOL_USER_PROMPT: &str = r#"<goal>Pick the most suitable tool for the following query.</goal>

<query>
{query}
</query>"#;

pub const CLEAN_CONTEXT_SYSTEM_PROMPT: &str = r#"<role>You curate input data for a language model.</role>

<goal>
Clean the provided passages: drop noise, duplicates, unfounded speculation, advertising, and anything unrelated to the query.
Keep only content that directly supports answering the query accurately.
</goal>

<constraints>
- Do not add any inference of your own.
- Do not paraphrase or rewrite; keep the valuable parts as-is.
- Keep the output to roughly 100-200 words.
</constraints>

<output_format>
Return the cleaned passage containing only content valuable for the query.
</output_format>"#;

pub const CLEAN_CONTEXT_USER_PROMPT: &str = r#"<query>
{query}
</query>

<context>
{context}
</context>"#;

pub const VALIDATE_OUTPUT_SYSTEM_PROMPT: &str = r#"<role>You assess information quality for a retrieval pipeline.</role>

<goal>
Judge whether the gathered information satisfies the query.
Decide whether more retrieval is needed, and if so, rewrite the query to target what is missing.
</goal>

<constraints>
- Judge objectively on relevance, accuracy, and completeness.
- Consider whether the information is specific and reliable enough to answer the query.
- Do not inject your own inferred facts into the assessment.
</constraints>

<output_format>
{
  "is_sufficient": true/false,
  "reasoning": "Short explanation of whether the information suffices",
  "missing_aspects": ["specific aspect still missing", "..."],
  "reformulated_query": "Rewritten query if more retrieval is needed"
}
</output_format>"#;

pub const VALIDATE_OUTPUT_USER_PROMPT: &str = r#"<step_query>
{step}
</step_query>

<retrieved_information>
{info}
</retrieved_information>"#;

pub const MERGE_CONTEXT_SYSTEM_PROMPT: &str = r#"<role>You consolidate and manage gathered information.</role>

<goal>
Merge information from multiple sources into one coherent, complete document.
</goal>

<constraints>
- Remove duplicated information.
- Combine related information together.
- Order the information logically.
- Keep every distinct valuable fact; do not drop important details.
- Preserve the accuracy of the original information.
</constraints>

<instructions>
Given the query and the collected information, consolidate everything into one coherent text.
New information supplements the existing information; it never wholesale replaces it.
Resolve contradictions between sources, keeping the result consistent.
</instructions>"#;

pub const MERGE_CONTEXT_USER_PROMPT: &str = r#"<query>
{query}
</query>

<existing_information>
{existing_info}
</existing_information>

<new_information>
{new_info}
</new_information>

Consolidate all of the above into one complete, coherent text."#;
