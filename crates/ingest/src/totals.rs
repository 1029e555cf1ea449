use std::io::BufRead;

use tracker_core::{ModelUsage, UsageMap, UsageRecord, normalize_model_name};

use crate::parser::extract_usage_record_from_line;

/// Folds one record into the map under its canonical model id.
pub fn accumulate(usage: &mut UsageMap, record: &UsageRecord) {
    let canonical = normalize_model_name(&record.raw_model_id);
    usage
        .entry(canonical.to_string())
        .or_default()
        .add_record(record);
}

pub fn aggregate_records<'a, I>(records: I) -> UsageMap
where
    I: IntoIterator<Item = &'a UsageRecord>,
{
    let mut usage = UsageMap::new();
    for record in records {
        accumulate(&mut usage, record);
    }
    usage
}

/// Aggregates raw log lines. Lines that are not JSON or carry no usage are skipped.
pub fn aggregate_lines<I, S>(lines: I) -> UsageMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut usage = UsageMap::new();
    for line in lines {
        if let Some(record) = extract_usage_record_from_line(line.as_ref()) {
            accumulate(&mut usage, &record);
        }
    }
    usage
}

/// Lines that are not valid UTF-8 are skipped like any other corrupt line.
/// Reading stops at the first I/O error.
pub fn usage_from_reader<R: BufRead>(reader: R) -> UsageMap {
    aggregate_lines(
        reader
            .split(b'\n')
            .map_while(|line| line.ok())
            .filter_map(|line| String::from_utf8(line).ok()),
    )
}

fn merge_model_usage(into: &mut ModelUsage, from: ModelUsage) {
    into.input_tokens = into.input_tokens.saturating_add(from.input_tokens);
    into.output_tokens = into.output_tokens.saturating_add(from.output_tokens);
    into.cache_read = into.cache_read.saturating_add(from.cache_read);
    into.cache_write = into.cache_write.saturating_add(from.cache_write);
    into.session_count = into.session_count.saturating_add(from.session_count);
    into.timestamps.extend(from.timestamps);
    into.aliases.extend(from.aliases);
}

/// Adds every entry of `from` into `into`.
pub fn merge_usage(into: &mut UsageMap, from: UsageMap) {
    for (model, usage) in from {
        merge_model_usage(into.entry(model).or_default(), usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn aliases_fold_into_canonical_entry() {
        let lines = [
            r#"{"model":"claude-sonnet-4-20250514","usage":{"input":100,"output":10}}"#,
            r#"{"model":"claude-3-5-sonnet-4-20250514","usage":{"input_tokens":50,"output_tokens":5}}"#,
            r#"{"model":"anthropic/claude-sonnet-4-20250514","usage":{"input":1,"output":1}}"#,
        ];
        let usage = aggregate_lines(lines);
        assert_eq!(usage.len(), 1);
        let entry = &usage["anthropic/claude-sonnet-4-20250514"];
        assert_eq!(entry.input_tokens, 151);
        assert_eq!(entry.output_tokens, 16);
        assert_eq!(entry.session_count, 3);
        assert_eq!(entry.aliases.len(), 3);
    }

    #[test]
    fn corrupt_lines_do_not_lose_the_rest() {
        let data = concat!(
            "{\"model\":\"m\",\"usage\":{\"input\":1,\"output\":2}}\n",
            "{broken json\n",
            "\n",
            "{\"type\":\"note\"}\n",
            "{\"model\":\"m\",\"usage\":{\"input\":3,\"output\":4}}\n",
        );
        let usage = usage_from_reader(Cursor::new(data));
        let entry = &usage["m"];
        assert_eq!(entry.input_tokens, 4);
        assert_eq!(entry.output_tokens, 6);
        assert_eq!(entry.session_count, 2);
    }

    #[test]
    fn invalid_utf8_line_does_not_stop_the_reader() {
        let mut data = Vec::new();
        data.extend_from_slice(b"{\"model\":\"m\",\"usage\":{\"input\":1}}\n");
        data.extend_from_slice(b"\xff\xfe garbage\n");
        data.extend_from_slice(b"{\"model\":\"m\",\"usage\":{\"input\":100}}\n");
        let usage = usage_from_reader(Cursor::new(data));
        assert_eq!(usage["m"].input_tokens, 101);
        assert_eq!(usage["m"].session_count, 2);
    }

    #[test]
    fn merge_adds_counts_and_keeps_aliases() {
        let mut left = aggregate_lines([r#"{"model":"a","usage":{"input":1}}"#]);
        let right = aggregate_lines([
            r#"{"model":"a","usage":{"input":2,"cacheRead":9},"timestamp":"2025-01-01T00:00:00Z"}"#,
            r#"{"model":"b","usage":{"output":5}}"#,
        ]);
        merge_usage(&mut left, right);
        assert_eq!(left["a"].input_tokens, 3);
        assert_eq!(left["a"].cache_read, 9);
        assert_eq!(left["a"].session_count, 2);
        assert_eq!(left["a"].timestamps.len(), 1);
        assert_eq!(left["b"].output_tokens, 5);
    }
}
