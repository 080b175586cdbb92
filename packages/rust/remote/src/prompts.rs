//! Prompt templates for the model-backed collaborators.

use chaingraph_shared::EvidenceDoc;

pub const PLANNER_SYSTEM: &str = "你是一位专注于产业链图谱规划的产业分析专家。";
pub const EXTRACTOR_SYSTEM: &str = "你是一个精准的数据抽取助手。";
pub const QUERY_SYSTEM: &str = "你是一个精准的搜索专家。";
pub const ADVISOR_SYSTEM: &str = "你是一位严谨的数据治理专家。";
pub const ENTAILMENT_SYSTEM: &str = "你是一个严格的事实核查助手，只依据给定文本作出判断。";

/// Characters of each document shown to the planner.
const PLAN_SUMMARY_CHARS: usize = 500;

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Number each document and tag it with its source, one block per document.
pub fn format_context(docs: &[EvidenceDoc]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "\n[Document {}] (Source: {})\n{}\n",
                i + 1,
                doc.source_id,
                doc.text
            )
        })
        .collect()
}

pub fn planner(topic: &str, context: &[EvidenceDoc]) -> String {
    let mut prompt = format!(
        r#"请分析“{topic}”产业的宏观产业链结构，识别上游（upstream）、中游（midstream）、下游（downstream）三个层级，并列出每个层级包含的具体环节名称。

要求：
1. 只返回 JSON，不要附加解释。
2. 环节名称应准确、专业，指向具体的物理环节或产品。
3. 三个字段的值都必须是字符串列表。

输出格式：
{{"upstream": ["原材料A", "关键设备B"], "midstream": ["核心部件制造"], "downstream": ["应用领域C"]}}
"#
    );

    if !context.is_empty() {
        prompt.push_str("\n基于以下参考文档摘要进行分析：\n");
        for (i, doc) in context.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {}\n",
                i + 1,
                truncate_chars(&doc.text, PLAN_SUMMARY_CHARS)
            ));
        }
    }
    prompt
}

pub fn extractor(entity: &str, context: &[EvidenceDoc]) -> String {
    let documents = format_context(context);
    format!(
        r#"请针对产业链环节“{entity}”，从下列参考文档中抽取结构化信息。

参考文档：
---
{documents}
---

字段说明：
1. entity_name：环节的标准名称。
2. input_elements：关键投入要素（原材料、零部件、上游设备），列表。
3. output_products：关键产出（产品、服务、中间件），列表。
4. key_technologies：涉及的关键工艺或技术，列表。
5. representative_companies：文中明确提及的代表性企业，列表。
6. description：50字以内的简短描述。

文档未提及的字段请填空列表或 null，不要编造。只返回 JSON：
{{"entity_name": "", "input_elements": [], "output_products": [], "key_technologies": [], "representative_companies": [], "description": null}}
"#
    )
}

pub fn node_queries(name: &str, topic: &str) -> String {
    format!(
        r#"请为产业链环节“{name}”（行业背景：“{topic}”）生成两组检索查询。

1. vector_queries：3-5 条语义检索语句，描述该环节的功能、工艺或上下游关系。
2. bm25_queries：3-5 条关键词查询，使用专有名词或行业术语，并包含“企业”“上市公司”“龙头”等后缀的查询。

只返回 JSON：
{{"vector_queries": ["..."], "bm25_queries": ["..."]}}
"#
    )
}

pub fn synonym_advice(topic: &str, names: &[String]) -> String {
    let list = serde_json::to_string(names).unwrap_or_default();
    format!(
        r#"以下是从“{topic}”行业文档中自动抽取的产业链节点列表，其中可能存在同义重复和非环节噪音。

节点列表：
{list}

请返回一个 JSON 对象：
1. merge_pairs：同义词合并对列表，每项包含 keep（保留的标准名，倾向更短、更通用的名称）和 drop（被合并的别名）。只合并确定指向同一环节的名称。
2. invalid_nodes：应删除的节点，包括抽象概念、政策、趋势、泛指（如“上游”）以及与产业链实体无关的词。

示例：
{{"merge_pairs": [{{"keep": "光伏玻璃", "drop": "太阳能光伏玻璃"}}], "invalid_nodes": ["行业政策", "市场前景"]}}
列表为空时返回空数组。
"#
    )
}

pub fn entailment(premise: &str, hypothesis: &str) -> String {
    format!(
        r#"判断“前提”是否支持“假设”。

前提：
{premise}

假设：
{hypothesis}

请给出 0 到 1 之间的支持分数 score（1 表示前提明确支持假设，0 表示无关或矛盾），并从前提中原样摘录最能支持假设的一句话作为 evidence；找不到时 evidence 为 null。只返回 JSON：
{{"score": 0.0, "evidence": null}}
"#
    )
}
