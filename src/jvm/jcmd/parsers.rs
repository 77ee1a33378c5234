use super::JcmdError;
use crate::gc::detector::GcCounters;
use crate::jvm::types::{Frame, GcCollector, RawClassEntry, StackSample, ThreadState};
use once_cell::sync::Lazy;
use regex::Regex;

static THREAD_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"(.*)"\s+#(\d+)\s*(.*)$"#).unwrap());

static THREAD_CPU: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcpu=([\d.]+)ms").unwrap());

static THREAD_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"java\.lang\.Thread\.State:\s+(\w+)").unwrap());

static STACK_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+at\s+([\w.$/\-]+)\.([\w$<>\-]+)\(").unwrap());

static CLASS_HISTOGRAM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+):\s+(\d+)\s+(\d+)\s+(.+?)\s*(?:\(.*\))?$").unwrap());

static HEAP_TOTAL_USED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"total\s+(\d+)K,\s+used\s+(\d+)K").unwrap());

static ZGC_HEAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ZHeap\s+used\s+(\d+)M,\s+capacity\s+(\d+)M,\s+max capacity\s+(\d+)M").unwrap()
});

static METASPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Metaspace\s+used\s+(\d+)K,\s+committed\s+(\d+)K,\s+reserved\s+(\d+)K").unwrap()
});

static MAX_HEAP_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-XX:MaxHeapSize=(\d+)").unwrap());

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Parsed `Thread.print` output.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadDump {
    /// Java threads only; VM-internal threads have no stack.
    pub samples: Vec<StackSample>,
    pub daemon_count: u32,
    /// Sum of per-thread CPU time, when the JVM reports it.
    pub total_cpu_ms: Option<f64>,
}

impl ThreadDump {
    pub fn thread_count(&self) -> u32 {
        self.samples.len() as u32
    }
}

pub fn parse_thread_dump(output: &str, captured_at: i64) -> Result<ThreadDump, JcmdError> {
    let mut samples: Vec<StackSample> = Vec::new();
    let mut daemon_count = 0u32;
    let mut total_cpu_ms: Option<f64> = None;
    // false while inside a VM-internal thread, whose lines belong to no sample
    let mut in_java_thread = false;

    for line in output.lines() {
        if let Some(caps) = THREAD_HEADER.captures(line) {
            let thread_id = caps[2]
                .parse::<u64>()
                .map_err(|e| JcmdError::Parse(format!("Failed to parse thread id: {}", e)))?;
            let rest = &caps[3];

            if rest.split_whitespace().any(|token| token == "daemon") {
                daemon_count += 1;
            }
            let cpu_ms = THREAD_CPU
                .captures(rest)
                .and_then(|c| c[1].parse::<f64>().ok());
            if let Some(ms) = cpu_ms {
                *total_cpu_ms.get_or_insert(0.0) += ms;
            }

            samples.push(StackSample {
                thread_id,
                thread_name: caps[1].to_string(),
                thread_state: ThreadState::Runnable,
                captured_at,
                frames: Vec::new(),
                cpu_time_ns: cpu_ms.map(|ms| (ms * 1_000_000.0) as u64),
            });
            in_java_thread = true;
            continue;
        }

        if line.starts_with('"') {
            in_java_thread = false;
            continue;
        }

        let current = match samples.last_mut() {
            Some(current) if in_java_thread => current,
            _ => continue,
        };

        if let Some(caps) = THREAD_STATE.captures(line) {
            current.thread_state = ThreadState::from_jvm_name(&caps[1]);
        } else if let Some(caps) = STACK_FRAME.captures(line) {
            current.frames.push(Frame::from_qualified(&caps[1], &caps[2]));
        }
    }

    if samples.is_empty() {
        return Err(JcmdError::Parse("No threads found in dump".to_string()));
    }

    Ok(ThreadDump {
        samples,
        daemon_count,
        total_cpu_ms,
    })
}

pub fn parse_class_histogram(output: &str) -> Result<Vec<RawClassEntry>, JcmdError> {
    let mut classes = Vec::new();

    for line in output.lines() {
        if let Some(caps) = CLASS_HISTOGRAM_LINE.captures(line) {
            let instances = caps[2]
                .parse::<u64>()
                .map_err(|e| JcmdError::Parse(format!("Failed to parse instances: {}", e)))?;
            let bytes = caps[3]
                .parse::<u64>()
                .map_err(|e| JcmdError::Parse(format!("Failed to parse bytes: {}", e)))?;

            classes.push(RawClassEntry::new(caps[4].trim(), instances, bytes));
        }
    }

    if classes.is_empty() {
        return Err(JcmdError::Parse("No classes found in histogram".to_string()));
    }

    Ok(classes)
}

/// Heap figures from `GC.heap_info`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapInfo {
    pub used: u64,
    pub committed: u64,
    /// Only some collectors print a maximum.
    pub max: Option<u64>,
    /// `(used, committed, reserved)`
    pub metaspace: Option<(u64, u64, u64)>,
    pub collector: Option<GcCollector>,
}

/// Generational collectors print one `total/used` line per generation;
/// they are summed.
pub fn parse_heap_info(output: &str) -> Result<HeapInfo, JcmdError> {
    let mut used = 0u64;
    let mut committed = 0u64;
    let mut max = None;
    let mut metaspace = None;
    let mut collector = None;
    let mut found = false;

    for line in output.lines() {
        if collector.is_none() {
            collector = GcCollector::from_heap_info_line(line);
        }
        if let Some(caps) = METASPACE.captures(line) {
            metaspace = Some((
                kilobytes(&caps[1])?,
                kilobytes(&caps[2])?,
                kilobytes(&caps[3])?,
            ));
        } else if let Some(caps) = HEAP_TOTAL_USED.captures(line) {
            committed += kilobytes(&caps[1])?;
            used += kilobytes(&caps[2])?;
            found = true;
        } else if let Some(caps) = ZGC_HEAP.captures(line) {
            used = number(&caps[1])? * MB;
            committed = number(&caps[2])? * MB;
            max = Some(number(&caps[3])? * MB);
            found = true;
        }
    }

    if !found {
        return Err(JcmdError::Parse("Failed to parse heap info".to_string()));
    }

    Ok(HeapInfo {
        used,
        committed,
        max,
        metaspace,
        collector,
    })
}

/// `-XX:MaxHeapSize` from `VM.flags`, in bytes.
pub fn parse_max_heap_size(output: &str) -> Option<u64> {
    MAX_HEAP_SIZE
        .captures(output)
        .and_then(|caps| caps[1].parse::<u64>().ok())
}

/// Reads `jstat -gcutil` by column name; column sets differ across JDKs.
pub fn parse_gc_counters(output: &str) -> Result<GcCounters, JcmdError> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let (Some(header), Some(data)) = (lines.next(), lines.next()) else {
        return Err(JcmdError::Parse("Invalid jstat output format".to_string()));
    };

    let columns: Vec<&str> = header.split_whitespace().collect();
    let values: Vec<&str> = data.split_whitespace().collect();
    if values.len() != columns.len() {
        return Err(JcmdError::Parse(format!(
            "Expected {} values, got {}",
            columns.len(),
            values.len()
        )));
    }

    let count = |name: &str| -> Result<u64, JcmdError> {
        jstat_column(&columns, &values, name)?
            .parse::<u64>()
            .map_err(|e| JcmdError::Parse(format!("Failed to parse {}: {}", name, e)))
    };
    let millis = |name: &str| -> Result<u64, JcmdError> {
        jstat_column(&columns, &values, name)?
            .parse::<f64>()
            .map(|seconds| (seconds * 1000.0).round() as u64)
            .map_err(|e| JcmdError::Parse(format!("Failed to parse {}: {}", name, e)))
    };

    Ok(GcCounters {
        young_count: count("YGC")?,
        young_time_ms: millis("YGCT")?,
        old_count: count("FGC")?,
        old_time_ms: millis("FGCT")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredJvm {
    pub pid: u32,
    pub main_class: String,
}

/// Parses `jcmd -l`, leaving out the JDK tools themselves.
pub fn parse_jcmd_list(output: &str) -> Vec<DiscoveredJvm> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, main_class) = line.split_once(' ')?;
            let pid = pid.parse::<u32>().ok()?;
            let main_class = main_class.trim().to_string();

            if is_jdk_tool(&main_class) {
                return None;
            }
            Some(DiscoveredJvm { pid, main_class })
        })
        .collect()
}

fn is_jdk_tool(main_class: &str) -> bool {
    main_class.contains("sun.tools.jcmd.JCmd")
        || main_class.contains("sun.tools.jps.Jps")
        || main_class.contains("sun.tools.jstat.Jstat")
}

fn jstat_column<'a>(columns: &[&str], values: &[&'a str], name: &str) -> Result<&'a str, JcmdError> {
    columns
        .iter()
        .position(|c| *c == name)
        .map(|i| values[i])
        .ok_or_else(|| JcmdError::Parse(format!("Missing jstat column {}", name)))
}

fn number(text: &str) -> Result<u64, JcmdError> {
    text.parse::<u64>()
        .map_err(|e| JcmdError::Parse(format!("Failed to parse {}: {}", text, e)))
}

fn kilobytes(text: &str) -> Result<u64, JcmdError> {
    Ok(number(text)? * KB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_thread_dump() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_thread_print.txt");
        let dump = parse_thread_dump(output, 1_000).unwrap();

        let names: Vec<&str> = dump.samples.iter().map(|s| s.thread_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["main", "Reference Handler", "http-worker-1", "http-worker-2", "Attach Listener"]
        );
        assert_eq!(dump.thread_count(), 5);
        assert_eq!(dump.daemon_count, 2);
        let total = dump.total_cpu_ms.unwrap();
        assert!((total - 2975.51).abs() < 1e-6);

        let main = &dump.samples[0];
        assert_eq!(main.thread_id, 1);
        assert_eq!(main.thread_state, ThreadState::TimedWaiting);
        assert_eq!(main.captured_at, 1_000);
        assert_eq!(main.cpu_time_ns, Some(1_520_750_000));
        assert_eq!(main.frames[0].to_string(), "java.lang.Thread.sleep0");
        assert_eq!(main.frames[2].to_string(), "com.acme.shop.App.main");
    }

    #[test]
    fn test_thread_dump_frames_leaf_first() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_thread_print.txt");
        let dump = parse_thread_dump(output, 0).unwrap();

        let worker = &dump.samples[2];
        assert_eq!(worker.thread_id, 31);
        assert_eq!(worker.thread_state, ThreadState::Runnable);
        assert_eq!(worker.frames.len(), 6);
        let leaf = worker.leaf().unwrap();
        assert_eq!(leaf.package_name, "com.acme.shop.db");
        assert_eq!(leaf.class_name, "OrderRepository");
        assert_eq!(leaf.method_name, "findByCustomer");
        assert_eq!(worker.frames[1].method_name, "lambda$list$0");
        assert_eq!(
            worker.frames[2].class_name,
            "OrderController$$Lambda/0x00007f3c14062a48"
        );

        let blocked = &dump.samples[3];
        assert_eq!(blocked.thread_state, ThreadState::Blocked);
        // lock lines are not frames
        assert_eq!(blocked.frames.len(), 3);

        // the VM threads after it do not leak frames or entries
        let attach = &dump.samples[4];
        assert!(attach.frames.is_empty());
    }

    #[test]
    fn test_parse_empty_thread_dump() {
        assert!(matches!(
            parse_thread_dump("4242:\n", 0),
            Err(JcmdError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_class_histogram() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_class_histogram.txt");
        let classes = parse_class_histogram(output).unwrap();

        assert_eq!(classes.len(), 6);
        assert_eq!(classes[0], RawClassEntry::new("[B", 182_904, 24_017_456));
        assert_eq!(classes[1].class_name, "java.lang.String");
        assert_eq!(classes[2].class_name, "com.acme.shop.model.Order");
        assert_eq!(classes[4].class_name, "[Ljava.lang.Object;");
    }

    #[test]
    fn test_parse_heap_info_g1() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_heap_info.txt");
        let heap = parse_heap_info(output).unwrap();

        assert_eq!(heap.used, 131_072 * KB);
        assert_eq!(heap.committed, 262_144 * KB);
        assert_eq!(heap.max, None);
        assert_eq!(heap.metaspace, Some((48_211 * KB, 48_832 * KB, 1_114_112 * KB)));
        assert_eq!(heap.collector, Some(GcCollector::G1));
    }

    #[test]
    fn test_parse_heap_info_generational() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_heap_info_parallel.txt");
        let heap = parse_heap_info(output).unwrap();

        assert_eq!(heap.used, (3_932 + 1_024) * KB);
        assert_eq!(heap.committed, (76_288 + 175_104) * KB);
        assert_eq!(heap.collector, Some(GcCollector::Parallel));
    }

    #[test]
    fn test_parse_heap_info_zgc() {
        let heap =
            parse_heap_info(" ZHeap           used 8M, capacity 256M, max capacity 4096M\n").unwrap();
        assert_eq!(heap.used, 8 * MB);
        assert_eq!(heap.committed, 256 * MB);
        assert_eq!(heap.max, Some(4_096 * MB));
        assert_eq!(heap.collector, Some(GcCollector::Z));
        assert!(parse_heap_info("nothing here").is_err());
    }

    #[test]
    fn test_parse_max_heap_size() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_vm_flags.txt");
        assert_eq!(parse_max_heap_size(output), Some(4_294_967_296));
        assert_eq!(parse_max_heap_size("-XX:+UseG1GC"), None);
    }

    #[test]
    fn test_parse_gc_counters() {
        let output = include_str!("../../../assets/sample_outputs/jstat_gcutil.txt");
        let counters = parse_gc_counters(output).unwrap();

        assert_eq!(
            counters,
            GcCounters {
                young_count: 1_254,
                young_time_ms: 12_877,
                old_count: 2,
                old_time_ms: 341,
            }
        );
    }

    #[test]
    fn test_parse_gc_counters_jdk8_columns() {
        let output = "  S0     S1     E      O      M     CCS    YGC     YGCT    FGC    FGCT     GCT\n\
                      0.00  99.94  42.17  11.53  97.60  94.16     17    0.104     0    0.000    0.104\n";
        let counters = parse_gc_counters(output).unwrap();
        assert_eq!(counters.young_count, 17);
        assert_eq!(counters.young_time_ms, 104);
        assert_eq!(counters.old_time_ms, 0);
    }

    #[test]
    fn test_parse_gc_counters_invalid() {
        assert!(parse_gc_counters("invalid output").is_err());
        assert!(parse_gc_counters("YGC YGCT\n1 2 3\n").is_err());
        assert!(parse_gc_counters("YGC YGCT\n1 0.5\n").is_err());
    }

    #[test]
    fn test_parse_jcmd_list() {
        let output = include_str!("../../../assets/sample_outputs/jcmd_list.txt");
        let jvms = parse_jcmd_list(output);

        assert_eq!(
            jvms,
            vec![
                DiscoveredJvm {
                    pid: 4242,
                    main_class: "com.acme.shop.App --port 8080".to_string(),
                },
                DiscoveredJvm {
                    pid: 48127,
                    main_class: "/opt/tools/sonarlint-ls.jar -stdio".to_string(),
                },
            ]
        );
    }
}
