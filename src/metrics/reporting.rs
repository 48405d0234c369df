//! Operator-facing report output
//!
//! All output here goes to stdout via `println!`, deliberately decoupled
//! from the `tracing` stream so the testable surface (RunMetrics,
//! Statistics, Assessment) never depends on console formatting.

use crate::config::Config;
use crate::metrics::aggregate::Statistics;
use crate::metrics::run::RunMetrics;
use crate::verdict::{Assessment, Verdict};

/// Print the full post-run report
pub fn print_report(
    config: &Config,
    metrics: &RunMetrics,
    stats: &Statistics,
    assessment: &Assessment,
) {
    println!("\n📊 Stampede Load Test Results");
    println!("═══════════════════════════════════════════════════════════════");

    println!("\n🔧 Configuration:");
    println!("   Endpoint:          {}", config.endpoint.url);
    println!("   Event Channel:     {}", config.channel_id);
    println!("   Users:             {}", config.load.user_count);
    println!("   Duration:          {}s", config.load.duration_secs);
    println!("   Ramp-up:           {}s", config.load.ramp_up_secs);

    println!("\n🔌 Connections:");
    println!("   Test Duration:     {:.2}s", metrics.duration_seconds());
    println!(
        "   Successful:        {} ({:.2}%)",
        metrics.successful_connections,
        metrics.success_rate()
    );
    println!(
        "   Failed:            {} ({:.2}%)",
        metrics.failed_connections,
        100.0 - metrics.success_rate()
    );
    println!(
        "   Connect Time:      avg {:.2}ms / min {}ms / max {}ms",
        stats.avg_connection_time_ms, stats.min_connection_time_ms, stats.max_connection_time_ms
    );

    println!("\n⚡ Throughput:");
    println!("   Messages Sent:     {}", stats.total_messages_sent);
    println!("   Messages Received: {}", stats.total_messages_received);
    println!("   Presence Updates:  {}", stats.total_presence_updates);
    println!("   Errors:            {}", stats.total_errors);
    println!("   Messages/sec:      {:.2}", stats.messages_per_second);
    println!("   Per User:          {:.2} messages", stats.avg_messages_per_user);

    print_conclusion(config, assessment);

    println!("═══════════════════════════════════════════════════════════════");
}

/// Print the verdict and capacity recommendation
fn print_conclusion(config: &Config, assessment: &Assessment) {
    let users = config.load.user_count;

    println!("\n🎯 Verdict: {}", assessment.verdict);
    match assessment.verdict {
        Verdict::Excellent => {
            println!(
                "   ✅ The backend comfortably supports {} concurrent users",
                users
            );
            println!(
                "   💡 Estimated maximum capacity: {} users",
                assessment.recommended_capacity
            );
        }
        Verdict::Acceptable => {
            println!(
                "   ⚠️  The backend supports {} concurrent users with caveats",
                users
            );
            println!("   💡 Monitor error rates before increasing concurrency");
        }
        Verdict::Poor => {
            println!(
                "   ❌ The backend struggled at {} concurrent users",
                users
            );
            println!(
                "   💡 Recommended safe capacity: {} users; investigate errors before retrying at this scale",
                assessment.recommended_capacity
            );
        }
    }
    println!(
        "   Success rate {:.2}%, error rate {:.2}%\n",
        assessment.success_rate, assessment.error_rate
    );
}
