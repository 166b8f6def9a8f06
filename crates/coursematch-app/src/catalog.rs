//! Built-in demo catalog used when no corpus file is configured.

use coursematch_core::corpus::CorpusStore;
use coursematch_core::error::Result;
use coursematch_core::types::CourseRecord;

pub fn builtin() -> Result<CorpusStore> {
    CorpusStore::new(vec![
        CourseRecord::new(
            "machine-learning",
            "Machine Learning",
            "Learn machine learning algorithms such as regression, decision trees and clustering.",
        )
        .with_metadata("level", "intermediate"),
        CourseRecord::new(
            "sql-for-analysts",
            "SQL for Analysts",
            "Master SQL to work with databases and analyze data.",
        )
        .with_metadata("level", "beginner"),
        CourseRecord::new(
            "neural-networks",
            "Neural Networks",
            "Learn the basics of neural networks and build your first models in Python.",
        )
        .with_metadata("level", "intermediate"),
        CourseRecord::new(
            "python-data-analysis",
            "Data Analysis in Python",
            "Learn to analyze data with pandas, numpy and matplotlib.",
        )
        .with_metadata("level", "beginner"),
        CourseRecord::new(
            "product-analytics",
            "Product Analytics",
            "Study the core product analytics metrics and learn to build reports.",
        )
        .with_metadata("level", "beginner"),
    ])
}
