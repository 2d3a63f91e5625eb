// Static scan of every source file for tracing calls that would write
// personal health data to the logs. Log opaque identifiers only.
