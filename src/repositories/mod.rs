pub(crate) mod exam_records;
