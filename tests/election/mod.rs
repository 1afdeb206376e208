mod failover_test;
mod mutual_exclusion_test;
mod step_down_test;
