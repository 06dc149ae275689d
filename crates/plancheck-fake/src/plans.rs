//! Captured `EXPLAIN (ANALYZE, BUFFERS)` output used as fixtures.

/// `ORDER BY` over 200k rows with `work_mem = '1MB'`.
pub const DISK_SORT: &str = "\
Sort  (cost=22906.82..23406.82 rows=200000 width=36) (actual time=181.404..222.310 rows=200000 loops=1)
  Sort Key: (md5((g.g)::text))
  Sort Method: external merge  Disk: 9424kB
  Buffers: shared hit=3, temp read=1178 written=1182
  ->  Function Scan on generate_series g  (cost=0.00..4500.00 rows=200000 width=36) (actual time=11.026..62.883 rows=200000 loops=1)
        Buffers: temp read=342 written=342
Planning:
  Buffers: shared hit=6
Planning Time: 0.092 ms
Execution Time: 230.744 ms";

/// Same query with `work_mem = '256MB'`.
pub const IN_MEMORY_SORT: &str = "\
Sort  (cost=22906.82..23406.82 rows=200000 width=36) (actual time=158.115..171.030 rows=200000 loops=1)
  Sort Key: (md5((g.g)::text))
  Sort Method: quicksort  Memory: 15806kB
  Buffers: shared hit=3
  ->  Function Scan on generate_series g  (cost=0.00..4500.00 rows=200000 width=36) (actual time=10.812..46.207 rows=200000 loops=1)
Planning Time: 0.071 ms
Execution Time: 178.902 ms";

pub const SEQ_SCAN: &str = "\
Seq Scan on orders  (cost=0.00..1943.00 rows=50 width=44) (actual time=0.015..12.337 rows=100 loops=1)
  Filter: (customer_id = 42)
  Rows Removed by Filter: 99900
  Buffers: shared hit=443 read=250
Planning Time: 0.120 ms
Execution Time: 12.401 ms";

pub const INDEX_SCAN: &str = "\
Index Scan using orders_customer_id_idx on orders  (cost=0.29..8.31 rows=1 width=44) (actual time=0.021..0.022 rows=1 loops=1)
  Index Cond: (customer_id = 42)
  Buffers: shared hit=3
Planning Time: 0.088 ms
Execution Time: 0.041 ms";

/// Parallel aggregate with workers.
pub const PARALLEL_AGGREGATE: &str = "\
Finalize Aggregate  (cost=10633.55..10633.56 rows=1 width=8) (actual time=41.230..43.116 rows=1 loops=1)
  Buffers: shared hit=5406
  ->  Gather  (cost=10633.33..10633.54 rows=2 width=8) (actual time=41.105..43.101 rows=3 loops=1)
        Workers Planned: 2
        Workers Launched: 2
        Buffers: shared hit=5406
        ->  Partial Aggregate  (cost=9633.33..9633.34 rows=1 width=8) (actual time=38.322..38.323 rows=1 loops=3)
              Buffers: shared hit=5406
              ->  Parallel Seq Scan on events  (cost=0.00..8591.67 rows=416667 width=0) (actual time=0.008..22.410 rows=333333 loops=3)
                    Buffers: shared hit=5406
Planning Time: 0.064 ms
Execution Time: 43.152 ms";

/// Plain `EXPLAIN` without `ANALYZE`: estimates only.
pub const ESTIMATE_ONLY: &str = "\
Hash Join  (cost=30.50..72.08 rows=1000 width=48)
  Hash Cond: (o.customer_id = c.id)
  ->  Seq Scan on orders o  (cost=0.00..22.00 rows=1200 width=16)
  ->  Hash  (cost=18.00..18.00 rows=1000 width=36)
        ->  Seq Scan on customers c  (cost=0.00..18.00 rows=1000 width=36)";
